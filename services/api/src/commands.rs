use clap::Args;
use psychoscales::config::AppConfig;
use psychoscales::error::AppError;
use psychoscales::scales::{load_scale_file, Catalog, RawAnswers, ScoreResult, ValidatedScale};
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub(crate) struct CheckArgs {
    /// Directory of scale JSON files (defaults to APP_SCALES_DIR)
    #[arg(long)]
    pub(crate) dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Scale definition file; its stem becomes the scale id
    #[arg(long)]
    pub(crate) file: PathBuf,
    /// Answers as a JSON object keyed by item id, e.g. '{"1": 4, "2": "3"}'
    #[arg(long)]
    pub(crate) answers: String,
}

pub(crate) fn run_check(args: CheckArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let mut settings = config.catalog.settings();
    if let Some(dir) = args.dir {
        settings.scales_dir = dir;
    }

    let catalog = Catalog::load(&settings)?;
    print!("{}", render_check_report(&catalog));

    match catalog.rejected().len() {
        0 => Ok(()),
        count => Err(AppError::RejectedScales(count)),
    }
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let settings = config.catalog.settings();

    let scale = load_scale_file(&args.file, &settings.defaults)?;
    let result = score_answers(&scale, &args.answers)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn score_answers(
    scale: &ValidatedScale,
    raw: &str,
) -> Result<ScoreResult, AppError> {
    let answers: RawAnswers = serde_json::from_str(raw)?;
    Ok(scale.score(&answers)?)
}

fn render_check_report(catalog: &Catalog) -> String {
    let mut out = String::new();
    out.push_str(&format!("Accepted scales ({}):\n", catalog.len()));
    for scale in catalog.scales() {
        let definition = scale.definition();
        out.push_str(&format!(
            "  - {} [{} / {}] {} items, {} subscales\n",
            definition.id,
            definition.tag,
            definition.language,
            definition.items.len(),
            definition.subscales.len()
        ));
    }

    if !catalog.rejected().is_empty() {
        out.push_str(&format!("Rejected files ({}):\n", catalog.rejected().len()));
        for rejected in catalog.rejected() {
            out.push_str(&format!("  - {}: {}\n", rejected.source, rejected.reason));
        }
    }

    out
}
