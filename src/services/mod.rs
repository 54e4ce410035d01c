pub mod pipeline_client;
pub mod queue;
pub mod reducer;
pub mod transport;
