pub mod run;
pub mod tracker;

use sunpoll_core::{Config, CoreError, InfluxSink, Poller, SolarEdgeClient, TrackerStore};

/// Wire the SolarEdge client, InfluxDB sink and tracker file into a poller.
pub fn build_poller(config: &Config) -> Result<Poller<SolarEdgeClient, InfluxSink>, CoreError> {
    let source = SolarEdgeClient::new(&config.solaredge, config.timezone)?;
    let sink = InfluxSink::new(&config.influx)?;
    log::info!("site {} -> {}", config.solaredge.site_id, sink.write_url());
    let store = TrackerStore::new(&config.tracker_file);
    Ok(Poller::new(source, sink, store, config.timezone))
}

/// Single-threaded runtime; the poll loop is strictly sequential.
pub fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}
