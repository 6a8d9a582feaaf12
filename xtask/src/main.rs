use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::process::{Command, Stdio};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "x")]
#[command(about = "Development automation for adamnet")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all CI checks (fmt, clippy, build, test)
    Ci {
        #[arg(long)]
        verbose: bool,
    },
    /// Format code
    Fmt {
        #[arg(long)]
        check: bool,
    },
    /// Run clippy
    Clippy {
        #[arg(long)]
        fix: bool,
    },
    /// Build the project
    Build {
        #[arg(long)]
        release: bool,
    },
    /// Run tests
    Test {
        #[arg(long)]
        doc: bool,
        #[arg(long)]
        ignored: bool,
        #[command(flatten)]
        modules: ModuleFilter,
    },
    /// Run benchmarks
    Bench,
    /// Type text through the bus and check it comes back out
    Demo {
        /// Text to type (defaults to "HELLO ADAM")
        #[arg(default_value = "HELLO ADAM")]
        text: String,
        /// Number of frames to run (defaults to 120)
        #[arg(short = 'n', long, default_value = "120")]
        frames: u64,
        /// Build in release mode
        #[arg(long)]
        release: bool,
    },
}

/// Library modules whose unit tests can be run on their own
#[derive(clap::Args, Default)]
struct ModuleFilter {
    /// Run only bus dispatcher tests
    #[arg(long)]
    bus: bool,
    /// Run only device tests (keyboard, network clock)
    #[arg(long)]
    device: bool,
    /// Run only response frame tests
    #[arg(long)]
    frame: bool,
    /// Run only control-block store tests
    #[arg(long)]
    control_block: bool,
}

impl ModuleFilter {
    /// `(module path, display name)` of every selected module
    fn selected(&self) -> Vec<(&'static str, &'static str)> {
        [
            (self.bus, "core::bus", "Bus"),
            (self.device, "core::device", "Device"),
            (self.frame, "core::frame", "Frame"),
            (self.control_block, "core::control_block", "Control block"),
        ]
        .into_iter()
        .filter(|(enabled, _, _)| *enabled)
        .map(|(_, path, name)| (path, name))
        .collect()
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci { verbose } => run_ci(verbose),
        Commands::Fmt { check } => run_fmt(check),
        Commands::Clippy { fix } => run_clippy(fix),
        Commands::Build { release } => run_build(release),
        Commands::Test {
            doc,
            ignored,
            modules,
        } => run_test(doc, ignored, &modules),
        Commands::Bench => run_bench(),
        Commands::Demo {
            text,
            frames,
            release,
        } => run_demo(&text, frames, release),
    }
}

fn run_ci(verbose: bool) -> Result<()> {
    println!("{}", "=== Running CI Pipeline ===".bold().blue());

    let start = Instant::now();

    run_task("Format Check", || run_fmt(true), verbose)?;
    run_task("Clippy", || run_clippy(false), verbose)?;
    run_task("Build", || run_build(false), verbose)?;
    run_task(
        "Test",
        || run_test(false, false, &ModuleFilter::default()),
        verbose,
    )?;

    let elapsed = start.elapsed();
    println!(
        "\n{} {}",
        "✓ CI passed in".green().bold(),
        format!("{:.2}s", elapsed.as_secs_f64()).bold()
    );

    Ok(())
}

fn run_fmt(check: bool) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("fmt").arg("--all");

    if check {
        cmd.arg("--").arg("--check");
    }

    execute_command(&mut cmd)
}

fn run_clippy(fix: bool) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("clippy").arg("--all-targets").arg("--all-features");

    if fix {
        cmd.arg("--fix");
    } else {
        cmd.arg("--").arg("-D").arg("warnings");
    }

    execute_command(&mut cmd)
}

fn run_build(release: bool) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("build");

    if release {
        cmd.arg("--release");
    }

    execute_command(&mut cmd)
}

fn run_test(doc: bool, ignored: bool, modules: &ModuleFilter) -> Result<()> {
    let test_cmd = |extra: &[&str]| {
        let mut cmd = Command::new("cargo");
        cmd.arg("test").arg("--all-features").args(extra);
        if ignored {
            cmd.arg("--").arg("--ignored");
        }
        cmd
    };

    if doc {
        return execute_command(&mut test_cmd(&["--doc"]));
    }

    let selected = modules.selected();
    if selected.is_empty() {
        return execute_command(&mut test_cmd(&[]));
    }

    let mut failed = Vec::new();
    for &(module_path, module_name) in &selected {
        println!("{} Running {} tests...", "→".blue(), module_name.bold());

        match execute_command(&mut test_cmd(&["--lib", module_path])) {
            Ok(_) => println!("{} {} tests passed\n", "✓".green(), module_name),
            Err(e) => {
                println!("{} {} tests failed\n", "✗".red(), module_name);
                if selected.len() == 1 {
                    return Err(e);
                }
                failed.push(module_name);
            }
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("Module tests failed: {}", failed.join(", "))
    }
}

fn run_bench() -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("bench");

    execute_command(&mut cmd)
}

fn run_demo(text: &str, frames: u64, release: bool) -> Result<()> {
    println!("{}", "=== Keyboard Demo ===".bold().blue());

    println!("{} Text: {}", "→".blue(), text.cyan());
    println!("{} Frames: {}", "→".blue(), frames.to_string().bold());
    println!(
        "{} Build mode: {}",
        "→".blue(),
        if release {
            "release".green().bold()
        } else {
            "debug".yellow().bold()
        }
    );
    println!();

    let start = Instant::now();

    let mut cmd = Command::new("cargo");
    cmd.arg("run").arg("--quiet").arg("--bin").arg("adamnet");

    if release {
        cmd.arg("--release");
    }

    cmd.arg("--")
        .arg("--type")
        .arg(text)
        .arg("-n")
        .arg(frames.to_string());

    let output = cmd.stderr(Stdio::inherit()).output()?;

    if !output.status.success() {
        println!("\n{} Demo failed", "✗".red().bold());
        anyhow::bail!("Demo failed with exit code: {}", output.status);
    }

    let received = String::from_utf8_lossy(&output.stdout);
    let received = received.trim_end_matches('\n');
    if received != text {
        println!(
            "{} Expected {:?}, received {:?}",
            "✗".red().bold(),
            text,
            received
        );
        anyhow::bail!("Keyboard demo output mismatch");
    }

    let elapsed = start.elapsed();
    println!(
        "{} Received {:?} in {}",
        "✓".green().bold(),
        received,
        format!("{:.2}s", elapsed.as_secs_f64()).bold()
    );

    Ok(())
}

fn run_task<F>(name: &str, task: F, verbose: bool) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    print!("{} {} ... ", "→".blue(), name);

    let start = Instant::now();

    match task() {
        Ok(_) => {
            let elapsed = start.elapsed();
            println!(
                "{} {}",
                "✓".green().bold(),
                if verbose {
                    format!("({:.2}s)", elapsed.as_secs_f64())
                } else {
                    String::new()
                }
            );
            Ok(())
        }
        Err(e) => {
            println!("{}", "✗".red().bold());
            Err(e)
        }
    }
}

fn execute_command(cmd: &mut Command) -> Result<()> {
    let status = cmd
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()?;

    if !status.success() {
        anyhow::bail!("Command failed with exit code: {}", status);
    }

    Ok(())
}
