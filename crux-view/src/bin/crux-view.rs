use crux_view::{CruxConfig, DirectoryViewLoader, ViewError, ViewLoader, ViewProcessor, ViewResult};
use std::env;
use std::io;
use std::path::Path;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const CONFIG_FILE: &str = "crux.yaml";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 3 || !matches!(args[1].as_str(), "metadata" | "html") {
        eprintln!("Usage: crux-view <metadata|html> <view-file>...");
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  crux-view metadata views/orders.crux.xml");
        eprintln!("  CRUX_DEVICE=smallDisplayTouch crux-view html views/*.crux.xml");
        process::exit(1);
    }

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ Invalid configuration: {}", e);
            process::exit(1);
        }
    };
    let device = env::var("CRUX_DEVICE").unwrap_or_else(|_| "all".to_string());

    let mut exit_code = 0;
    for file_path in &args[2..] {
        if let Err(e) = compile_file(&args[1], file_path, &config, &device) {
            eprintln!("✗ {} has errors:", file_path);
            print_error(&e);
            exit_code = 1;
        }
    }

    process::exit(exit_code);
}

fn load_config() -> ViewResult<CruxConfig> {
    match env::var("CRUX_CONFIG") {
        Ok(path) => CruxConfig::from_file(path),
        Err(_) if Path::new(CONFIG_FILE).is_file() => CruxConfig::from_file(CONFIG_FILE),
        Err(_) => Ok(CruxConfig::default()),
    }
}

fn compile_file(command: &str, path: &str, config: &CruxConfig, device: &str) -> ViewResult<()> {
    let path = Path::new(path);
    let dir = path.parent().unwrap_or(Path::new("."));
    let view_loader = Arc::new(DirectoryViewLoader::new(dir));
    let processor = ViewProcessor::new(Some(view_loader.clone() as Arc<dyn ViewLoader>), config)?;

    let view_id = view_id(path);
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let view = processor
        .load_view(view_loader.open_view(&file_name)?, &path.display().to_string(), device)?
        .ok_or_else(|| ViewError::InvalidView(format!("view {} not found", path.display())))?;

    match command {
        "metadata" => {
            let metadata = processor.extract_metadata(&view_id, &view, false)?;
            let json = if processor.must_indent() {
                serde_json::to_string_pretty(&metadata)?
            } else {
                serde_json::to_string(&metadata)?
            };
            println!("{}", json);
        }
        _ => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            processor.generate_html(&view_id, &view, &mut out)?;
        }
    }
    Ok(())
}

/// `views/orders.crux.xml` → `orders`.
fn view_id(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.split('.').next().unwrap_or_default().to_string()
}

fn print_error(error: &ViewError) {
    match error {
        ViewError::ViewLoad { source, .. }
        | ViewError::MetadataExtraction { source, .. }
        | ViewError::HtmlGeneration { source, .. } => eprintln!("    {}", source),
        other => eprintln!("    {}", other),
    }
}
