use sixpack::{ClientConfig, Experiment, Visitor};

pub fn main() -> sixpack::Result<()> {
    env_logger::init();

    let base_url = std::env::var("SIXPACK_BASE_URL")
        .unwrap_or_else(|_| ClientConfig::DEFAULT_BASE_URL.to_owned());
    let client = ClientConfig::from_base_url(base_url).to_client()?;

    let experiment = Experiment::new("button-color", ["red", "blue", "green"])?;
    let visitor = Visitor::new().user_agent("sixpack-demo");

    // Even if the server is down, an alternative is returned (here, "red").
    let participation = client.participate(&experiment, &visitor)?;
    if let Some(err) = &participation.error {
        println!("Sixpack unavailable: {}", err);
    }
    println!("Alternative: {}", participation.alternative);

    // Convert using the client id the server recorded.
    let client_id = participation
        .response
        .map(|response| response.client_id)
        .unwrap_or_default();
    let conversion = client.convert(&experiment, &visitor.client_id(client_id), None)?;
    println!("Conversion recorded: {}", conversion.is_recorded());

    Ok(())
}
