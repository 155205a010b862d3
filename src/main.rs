//! kiln's main application entry point and orchestration logic.
//! Handles command-line argument parsing, configuration discovery,
//! and dispatches to the forward renderer or the reverse harvester.

use kiln::{
    cli::{get_args, std_stream_path, Args, Command},
    config::{discover_root, load_mapping, Settings},
    constants::CONFIG_FILE,
    error::{default_error_handler, Result},
    gateway::SopsGateway,
    harvester::Harvester,
    logger::{init_logger, level_from_setting, set_level},
    processor::{render_file, Processor, RenderOptions},
    renderer::MiniJinjaRenderer,
};
use log::{debug, info, LevelFilter};

/// Main application entry point.
fn main() {
    let args = get_args();

    // Streamed templates must not mix with log lines
    let quiet = matches!(
        &args.command,
        Command::Template { input, output }
            if std_stream_path(input).is_none() || std_stream_path(output).is_none()
    );
    init_logger(
        !quiet,
        if args.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        },
    );

    if let Err(err) = run(args, quiet) {
        default_error_handler(err);
    }
}

/// Main application logic execution.
///
/// # Flow
/// 1. Discovers the working root holding kiln.yaml
/// 2. Loads the configuration mapping with decrypted secrets merged in
/// 3. Resolves settings and applies the configured log level
/// 4. Runs the requested command
fn run(args: Args, quiet: bool) -> Result<()> {
    if args.command == Command::Version {
        println!("kiln {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let root = discover_root()?;
    let gateway = SopsGateway::locate(&root).unwrap_or_else(|e| {
        debug!("{}", e);
        SopsGateway::new("sops", &root)
    });
    let mapping = load_mapping(&root, &gateway)?;
    let settings = Settings::resolve(&root, &mapping, |var| std::env::var(var).ok())?;

    if !quiet && !args.verbose {
        set_level(level_from_setting(settings.log_level.as_deref()));
    }
    info!("Using config file: {}", root.join(CONFIG_FILE).display());

    match args.command {
        Command::Render {
            cleanup_terraform,
            remove_directories,
        } => {
            let renderer = MiniJinjaRenderer::new(&settings.delimiters)?;
            let processor = Processor::new(
                &renderer,
                &gateway,
                &mapping,
                &settings.source,
                &settings.target,
            );
            processor.render_tree(
                &settings.taint_marker(),
                RenderOptions {
                    remove_tool_state: cleanup_terraform,
                    remove_all_directories: remove_directories,
                },
            )?;
        }
        Command::Template { input, output } => {
            let renderer = MiniJinjaRenderer::new(&settings.delimiters)?;
            render_file(
                &renderer,
                &mapping,
                std_stream_path(&input),
                std_stream_path(&output),
            )?;
        }
        Command::StoreSecrets => {
            let harvester = Harvester::new(
                &gateway,
                &mapping,
                settings.secrets_document(),
                settings.taint_marker(),
            );
            let report = harvester.harvest(&settings.secrets, &settings.source, &settings.target)?;
            println!(
                "Stored {} secrets and re-encrypted {} files ({} unchanged, {} skipped, {} failed).",
                report.stored, report.reencrypted, report.unchanged, report.skipped, report.failed
            );
        }
        Command::Version => {}
    }
    Ok(())
}
