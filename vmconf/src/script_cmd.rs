use anyhow::{Context, Result};
use chrono::Local;
use vmconf::detect::SCRIPT_FILE_NAME;
use vmconf::{generate_script_with, ConfigFormat, SectionCatalog};

use crate::cli::ScriptArgs;
use crate::input::{apply_defaults, load_model};
use crate::output::{emit, make_executable};

pub fn run_script(args: ScriptArgs, catalog: &SectionCatalog) -> Result<()> {
    let target: ConfigFormat = args.target.parse()?;

    let model = load_model(&args.input, args.from)?;
    let model = apply_defaults(
        model,
        args.with_defaults,
        args.defaults_file.as_deref(),
        catalog,
    );

    let script = generate_script_with(&model, target, catalog, Local::now().naive_local())
        .with_context(|| {
            format!(
                "failed to generate {target} deployment script for {}",
                args.input.display()
            )
        })?;

    // A directory output receives the conventional script name.
    let output = args.output.map(|path| {
        if path.is_dir() {
            path.join(SCRIPT_FILE_NAME)
        } else {
            path
        }
    });
    emit(&script, output.as_deref(), &args.input)?;
    if let Some(path) = &output {
        make_executable(path)?;
    }
    Ok(())
}
