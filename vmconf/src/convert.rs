//! `convert`: decode one configuration and encode it in another format.

use anyhow::{Context, Result};
use tracing::info;
use vmconf::detect::suggested_file_name;
use vmconf::report::{render_summary, summarize};
use vmconf::{encode, ConfigFormat, SectionCatalog};

use crate::cli::ConvertArgs;
use crate::input::{apply_defaults, load_model};
use crate::output::emit;

pub fn run_convert(args: ConvertArgs, catalog: &SectionCatalog) -> Result<()> {
    let to: ConfigFormat = args.to.parse()?;

    let model = load_model(&args.input, args.from)?;
    let model = apply_defaults(
        model,
        args.with_defaults,
        args.defaults_file.as_deref(),
        catalog,
    );

    let text = encode(to, &model, catalog)
        .with_context(|| format!("failed to encode {} as {to}", args.input.display()))?;
    emit(&text, args.output.as_deref(), &args.input)?;

    if let Some(output) = &args.output {
        info!(
            output = %output.display(),
            suggested = %suggested_file_name(to, &model),
            "wrote configuration"
        );
        eprintln!("{}", render_summary(summarize(&model, catalog)));
    }
    Ok(())
}
