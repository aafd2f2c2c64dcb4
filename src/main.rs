use log::{debug, info};
use std::env;
use std::fs::File;
use std::io::prelude::*;
use std::path::{Path, PathBuf};
use zvm::builder::MachineBuilder;
use zvm::config::EngineConfig;
use zvm::console::{self, ConsoleOutput, ConsoleStatus, ConsoleTerminal, FileSaves, LogTrace};
use zvm::memory::MemoryImage;

const DEFAULT_CONFIG: &str = "zvm.toml";

struct Options {
    story: PathBuf,
    config: Option<PathBuf>,
    seed: Option<u64>,
    trace: bool,
}

fn usage(program: &str) {
    println!("zvm - Z-machine interpreter for story files (versions 1-5, 7, 8)");
    println!();
    println!(
        "Usage: {} <story_file> [--config file] [--seed n] [--trace]",
        program
    );
    println!("Examples:");
    println!("  {} zork1.z3", program);
    println!("  {} trinity.z4 --seed 42", program);
    println!();
    println!("Settings are read from --config, or from {} when present.", DEFAULT_CONFIG);
    println!("--trace logs every instruction (run with RUST_LOG=trace to see it).");
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut options = Options {
        story: PathBuf::from(&args[1]),
        config: None,
        seed: None,
        trace: false,
    };
    let mut rest = args[2..].iter();
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--config" => {
                let path = rest.next().ok_or("--config needs a file name")?;
                options.config = Some(PathBuf::from(path));
            }
            "--seed" => {
                let value = rest.next().ok_or("--seed needs a number")?;
                let seed = value
                    .parse::<u64>()
                    .map_err(|_| format!("Invalid seed: {}", value))?;
                options.seed = Some(seed);
            }
            "--trace" => options.trace = true,
            other => return Err(format!("Unknown option: {}", other)),
        }
    }
    Ok(options)
}

fn load_config(options: &Options) -> Result<EngineConfig, String> {
    let mut config = match &options.config {
        Some(path) => EngineConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => EngineConfig::load(DEFAULT_CONFIG)?,
        None => EngineConfig::default(),
    };
    if options.seed.is_some() {
        config.seed = options.seed;
    }
    Ok(config)
}

fn read_story(path: &Path) -> Vec<u8> {
    // Explicit match so common mistakes get a readable message
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            match e.kind() {
                std::io::ErrorKind::NotFound => {
                    eprintln!("Error: Story file not found: {}", path.display());
                    eprintln!();
                    eprintln!("Please check:");
                    eprintln!("• File path is correct");
                    eprintln!("• You're running from the right directory");
                }
                std::io::ErrorKind::PermissionDenied => {
                    eprintln!(
                        "Error: Permission denied accessing story file: {}",
                        path.display()
                    );
                }
                _ => {
                    eprintln!("Error: Cannot open story file '{}': {}", path.display(), e);
                }
            }
            std::process::exit(1);
        }
    };
    let mut story = Vec::new();
    if let Err(e) = file.read_to_end(&mut story) {
        eprintln!("Error: Cannot read story file '{}': {}", path.display(), e);
        std::process::exit(1);
    }
    story
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        usage(&args[0]);
        return Ok(());
    }

    let options = parse_args(&args)?;
    let config = load_config(&options)?;
    let story = read_story(&options.story);
    debug!("Loaded {} bytes from {}", story.len(), options.story.display());

    let source_name = options
        .story
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("story"));
    let save_dir = options
        .story
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let image = MemoryImage::new(story.clone())?;
    let saves = FileSaves::new(save_dir, image.pristine_dynamic());

    let mut builder = MachineBuilder::new(story)
        .source_name(source_name)
        .config(config)
        .output(ConsoleOutput::new(&options.story))
        .status_line(ConsoleStatus)
        .save_restore(saves)
        .terminal(ConsoleTerminal);
    if options.trace {
        builder = builder.debugger(LogTrace);
    }
    let mut interpreter = builder.build()?;
    info!("Story version {}", interpreter.vm.version());

    let stdin = std::io::stdin();
    match console::run_console(&mut interpreter, stdin.lock()) {
        Ok(()) => {
            debug!("Story ended after {} instructions", interpreter.instruction_count());
            Ok(())
        }
        Err(e) => {
            eprintln!("\nError during execution: {e}");
            Err(e.into())
        }
    }
}
