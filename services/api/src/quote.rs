use crate::infra::{build_persistent_service, build_service, parse_decimal, LeaseQuoteService};
use clap::{Args, Subcommand};
use lease_quote::config::AppConfig;
use lease_quote::error::AppError;
use lease_quote::pricing::{
    ratio_label, PersistedSettings, QuoteError, QuoteInput, QuoteOptions, QuoteResult, QuoteView,
    RateMatrix,
};
use rust_decimal::Decimal;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct QuoteArgs {
    /// Product price as typed by the customer
    #[arg(long)]
    pub(crate) price: String,
    /// Down-payment ratio, e.g. 0.3 for 30% down
    #[arg(long, value_parser = parse_decimal)]
    pub(crate) ratio: Decimal,
    /// Lease term in periods (the first period is the down payment)
    #[arg(long)]
    pub(crate) term: u32,
    /// Print the quote as JSON instead of a text breakdown
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct OptionsArgs {
    /// Ratio to list terms for (defaults to the preselected ratio)
    #[arg(long, value_parser = parse_decimal)]
    pub(crate) ratio: Option<Decimal>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum SettingsAction {
    /// Print the current settings as JSON
    Show,
    /// Write the settings document to a file (or stdout)
    Export {
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replace all settings with a JSON document, repairing missing fields
    Import { file: PathBuf },
    /// Discard stored settings and return to the defaults
    Reset,
    /// Show the ratio × term rate grid
    Rates {
        /// Emit the grid as CSV suitable for `import-rates`
        #[arg(long)]
        csv: bool,
    },
    /// Apply displayed rates from a CSV grid; blank cells are left unchanged
    ImportRates { file: PathBuf },
}

fn open_service() -> Result<LeaseQuoteService, AppError> {
    let config = AppConfig::load()?;
    Ok(build_service(&config.pricing)?)
}

fn open_persistent_service(command: &'static str) -> Result<LeaseQuoteService, AppError> {
    let config = AppConfig::load()?;
    build_persistent_service(&config.pricing, command)
}

impl SettingsAction {
    /// Name of the command when it edits stored settings.
    fn edit_command(&self) -> Option<&'static str> {
        match self {
            SettingsAction::Import { .. } => Some("settings import"),
            SettingsAction::Reset => Some("settings reset"),
            SettingsAction::ImportRates { .. } => Some("settings import-rates"),
            SettingsAction::Show | SettingsAction::Export { .. } | SettingsAction::Rates { .. } => {
                None
            }
        }
    }
}

pub(crate) fn run_quote(args: QuoteArgs) -> Result<(), AppError> {
    let QuoteArgs {
        price,
        ratio,
        term,
        json,
    } = args;

    let service = open_service()?;
    let input = QuoteInput::parse(&price, ratio, term).map_err(QuoteError::from)?;
    let quote = service.quote(input)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&QuoteView::from(quote))?);
    } else {
        print!("{}", render_quote(&quote));
    }
    Ok(())
}

pub(crate) fn run_options(args: OptionsArgs) -> Result<(), AppError> {
    let service = open_service()?;
    let options = service.options(args.ratio)?;
    print!("{}", render_options(&options));
    Ok(())
}

pub(crate) fn run_settings(action: SettingsAction) -> Result<(), AppError> {
    let service = match action.edit_command() {
        Some(command) => open_persistent_service(command)?,
        None => open_service()?,
    };

    match action {
        SettingsAction::Show => {
            println!("{}", serde_json::to_string_pretty(&service.export())?);
        }
        SettingsAction::Export { output } => {
            let body = serde_json::to_string_pretty(&service.export())?;
            match output {
                Some(path) => {
                    fs::write(&path, body)?;
                    println!("Settings written to {}", path.display());
                }
                None => println!("{body}"),
            }
        }
        SettingsAction::Import { file } => {
            let raw = fs::read_to_string(&file)?;
            let document: PersistedSettings = serde_json::from_str(&raw)?;
            let repairs = service.import(document)?;
            println!("Imported settings from {}", file.display());
            for note in repairs {
                println!("  repaired {}: {}", note.field, note.detail);
            }
        }
        SettingsAction::Reset => {
            service.reset()?;
            println!("Settings reset to defaults");
        }
        SettingsAction::Rates { csv } => {
            let matrix = service.rate_matrix();
            if csv {
                let stdout = io::stdout();
                matrix
                    .write_csv(stdout.lock())
                    .map_err(|err| AppError::Io(io::Error::new(io::ErrorKind::Other, err)))?;
            } else {
                print!("{}", render_rate_matrix(&matrix));
            }
        }
        SettingsAction::ImportRates { file } => {
            let reader = fs::File::open(&file)?;
            let written = service.import_rate_csv(reader)?;
            println!("Updated {written} rate cell(s) from {}", file.display());
        }
    }

    io::stdout().flush()?;
    Ok(())
}

pub(crate) fn money(amount: Decimal) -> String {
    format!("¥{:.2}元", amount)
}

pub(crate) fn render_quote(quote: &QuoteResult) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Lease quote: price {} with {} over {} periods\n",
        money(quote.price),
        ratio_label(quote.ratio),
        quote.term
    ));
    out.push_str(&format!("  Down payment (period 1): {}\n", money(quote.down_payment)));
    out.push_str(&format!("  Unpaid balance: {}\n", money(quote.unpaid_balance)));
    out.push_str(&format!(
        "  Rate applied: {}%\n",
        quote.effective_rate.normalize()
    ));
    out.push_str(&format!("  Financed rent: {}\n", money(quote.financed_rent)));
    out.push_str(&format!(
        "  Service cost (from {}): {}\n",
        quote.service_cost_floor,
        money(quote.service_cost)
    ));
    out.push_str(&format!("  Total payable: {}\n", money(quote.total_payable)));
    out.push_str("  Installments:\n");
    for installment in quote.schedule() {
        out.push_str(&format!(
            "    Period {:>2}: {}\n",
            installment.period,
            money(installment.amount)
        ));
    }
    out
}

pub(crate) fn render_options(options: &QuoteOptions) -> String {
    let mut out = String::from("Down-payment ratios:\n");
    for ratio in &options.ratios {
        let marker = if *ratio == options.selected_ratio { "*" } else { " " };
        out.push_str(&format!(" {marker} {}\n", ratio_label(*ratio)));
    }
    let terms: Vec<String> = options.terms.iter().map(|term| term.to_string()).collect();
    out.push_str(&format!(
        "Terms for {}: {}\n",
        ratio_label(options.selected_ratio),
        terms.join(", ")
    ));
    out
}

pub(crate) fn render_rate_matrix(matrix: &RateMatrix) -> String {
    let mut out = format!("{:<10}", "");
    for term in &matrix.terms {
        out.push_str(&format!("{:>10}", format!("{term} periods")));
    }
    out.push('\n');

    for row in &matrix.rows {
        out.push_str(&format!("{:<10}", row.label));
        for cell in &row.cells {
            let text = if cell.explicit {
                cell.display_text.clone()
            } else {
                format!("{}*", cell.display_text)
            };
            out.push_str(&format!("{text:>10}"));
        }
        out.push('\n');
    }
    out.push_str("* base rate\n");
    out
}
