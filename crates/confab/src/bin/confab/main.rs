mod cli;

use confab::reader::Location;
use confab::unit::{Assembly, BuilderContext, ConfigUnit, TracingReporter};
use confab::value::Value;
use std::path::Path;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("CONFAB_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = match cli.command {
        cli::Command::Assemble(assemble_cli) => assemble(assemble_cli),
        cli::Command::Dev(dev_cli) => dev(dev_cli),
    };

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

/// Assembly plan: unit names to ordered fragment locations
#[derive(serde::Deserialize, Debug)]
struct Plan {
    units: indexmap::IndexMap<String, Vec<String>>,

    /// extra tree merged into every ordinary unit
    #[serde(default)]
    addition: serde_yaml::Value,
}

fn load_plan(path: &Path) -> anyhow::Result<Plan> {
    let contents = std::fs::read_to_string(path)?;

    let plan = match path.extension().and_then(|extension| extension.to_str()) {
        Some("json") => serde_json::from_str(&contents)?,
        _ => serde_yaml::from_str(&contents)?,
    };

    Ok(plan)
}

fn prepare(args: &cli::PlanArgs) -> anyhow::Result<(Assembly, BuilderContext)> {
    let plan = load_plan(&args.plan)?;

    let base_dir = match &args.base_dir {
        Some(path) => path.canonicalize()?,
        None => std::env::current_dir()?,
    };
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| base_dir.join("assembled"));

    let addition = match plan.addition {
        serde_yaml::Value::Null => Value::empty(),
        tree => tree.into(),
    };

    let units = plan.units.into_iter().map(|(name, locations)| {
        let locations = locations.iter().map(|raw| Location::parse(raw)).collect();
        ConfigUnit::new(name, locations)
    });

    let mut context = BuilderContext::new(base_dir, output_dir, addition);
    context.reporter = Some(Box::new(TracingReporter));

    Ok((Assembly::new(units), context))
}

pub fn assemble(cli: cli::AssembleCommand) -> anyhow::Result<()> {
    let (mut assembly, mut context) = prepare(&cli.plan)?;
    assembly.run(&mut context)
}

pub fn dev(cli: cli::DevCommand) -> anyhow::Result<()> {
    let (mut assembly, mut context) = prepare(&cli.plan)?;
    assembly.build_all(&mut context);

    match &cli.unit {
        Some(name) => {
            let Some(unit) = assembly.get(name) else {
                anyhow::bail!("Unknown unit {name}");
            };
            let Some(merged) = unit.merged() else {
                anyhow::bail!("Unit {name} was not built");
            };

            output(&cli.format, merged)?;
        }
        None => {
            for unit in assembly.units() {
                println!("# {}", unit.name());
                output(&cli.format, unit.merged().unwrap_or(&Value::Null))?;
                println!();
            }
        }
    }

    Ok(())
}

fn output(format: &cli::OutputFormat, value: &Value) -> anyhow::Result<()> {
    match format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), value)?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(std::io::stdout(), value)?,
    };

    Ok(())
}
