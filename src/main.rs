use clap::Parser;
use copula_verify::utils::{logger, validation::Validate};
use copula_verify::{
    CliConfig, ConformanceOrchestrator, HttpTransport, NodeCardService, NodeFacilityService,
    VerifyError,
};
use copula_verify::core::requests::Requests;
use std::sync::Arc;

fn exit_with(e: &VerifyError) -> ! {
    tracing::error!(
        "❌ Verification failed: {} (Category: {:?})",
        e,
        e.category()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e);
    eprintln!("💡 建議: {}", e.recovery_suggestion());
    std::process::exit(e.exit_code());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting copula-verify");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    // 驗證配置
    if let Err(e) = cli.validate() {
        exit_with(&e);
    }
    let config = match cli.load_verifier_config().and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => exit_with(&e),
    };

    tracing::info!("🎯 Target service: {}", config.service.endpoint);

    let transport = match HttpTransport::new(&config.service) {
        Ok(transport) => Arc::new(transport),
        Err(e) => exit_with(&e),
    };
    let requests = Requests::new(&config.cabinet);
    let cards = NodeCardService::new(transport.clone(), requests.clone(), config.profile.pin.clone());
    let facility = NodeFacilityService::new(transport.clone(), requests);

    let execution_id = cli
        .execution_id
        .clone()
        .unwrap_or_else(|| format!("verify_{}", chrono::Utc::now().format("%Y%m%d_%H%M%S")));

    let mut orchestrator =
        ConformanceOrchestrator::new(config, transport, cards, facility, cli.card_id.clone())
            .with_execution_id(execution_id);

    match orchestrator.run().await {
        Ok(report) => {
            tracing::info!(
                "✅ All checks passed for card {} ({} phases, {:?})",
                report.card_id,
                report.phases.len(),
                report.total_duration()
            );
            println!("✅ All checks passed for card {}", report.card_id);
            println!("{}", serde_json::to_string_pretty(&report.summary())?);
        }
        Err(e) => exit_with(&e),
    }

    Ok(())
}
