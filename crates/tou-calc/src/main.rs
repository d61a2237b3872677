mod bootstrap;
mod report;

use anyhow::Result;
use tou_core::settings::Settings;
use tou_runtime::session::{CalculationRequest, CalculationSession};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("ToU calculator v{} starting", env!("CARGO_PKG_VERSION"));

    let request = CalculationRequest::from_settings(&settings)?;
    tracing::info!(
        "Data: {}, Schedule: {}, Timezone: {}",
        request.data_path.display(),
        request.schedule_path.display(),
        request.decode.timezone
    );

    let mut session = CalculationSession::new();
    if session.calculate(&request).await?.is_none() {
        println!(
            "No usable {} readings found in {}",
            request.config.property,
            request.data_path.display()
        );
        return Ok(());
    }

    let rendered = session.with_result(|result, fmt| match settings.format.as_str() {
        "json" => report::render_json(result, &request.config).map_err(anyhow::Error::from),
        _ => report::render_text(result, &request.config, fmt).map_err(anyhow::Error::from),
    });
    if let Some(output) = rendered {
        println!("{}", output?);
    }

    Ok(())
}
