//! `viesti` binary: the gateway with settings from `VIESTI_*` variables

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    viesti_runtime::run().await
}
