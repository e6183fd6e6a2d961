mod analyzer;
mod duration;
mod error;
mod models;
mod normalizer;
mod ranks;
mod rules;

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::ExitCode;

use analyzer::{PromotionAnalysis, PromotionAnalyzer};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Arg, ArgAction, ArgMatches, Command};
use csv::{ReaderBuilder, WriterBuilder};
use error::PromotionError;
use models::{Config, TraceLevel};
use normalizer::{Normalizer, RawTable, TableSchema};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_CONFIG_FILE: &str = "promotion.toml";
const DELIMITER: u8 = b';';
const UTF8_BOM: &str = "\u{feff}";

fn cli() -> Command {
    Command::new("promotion-analyzer")
        .version("1.0")
        .about("Checks fire brigade members against the promotion criteria (NFeuerwVO)")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(DEFAULT_CONFIG_FILE),
        )
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("FILE")
                .help("Personnel export [CSV]"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Result table [CSV]"),
        )
        .arg(
            Arg::new("date")
                .short('d')
                .long("date")
                .value_name("DATE")
                .help("Reference date for all checks [dd.mm.yyyy], defaults to today"),
        )
        .arg(
            Arg::new("trace")
                .long("trace")
                .value_parser(["warning", "info", "debug"])
                .help("Logging level"),
        )
        .arg(
            Arg::new("new-rank-names")
                .long("new-rank-names")
                .action(ArgAction::SetTrue)
                .help("Report eligible ranks with the current ordinance names"),
        )
        .arg(
            Arg::new("init-config")
                .long("init-config")
                .action(ArgAction::SetTrue)
                .help("Write the default configuration file and exit"),
        )
}

/// Config file (if present) overridden by command line values.
fn load_config(matches: &ArgMatches) -> Result<Config> {
    let config_file = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG_FILE);

    let mut config = if Path::new(config_file).exists() {
        Config::load_from_file(config_file)
            .with_context(|| format!("Failed to load configuration: {}", config_file))?
    } else {
        Config::default()
    };

    if let Some(input) = matches.get_one::<String>("input") {
        config.input = input.clone();
    }
    if let Some(output) = matches.get_one::<String>("output") {
        config.output = output.clone();
    }
    if let Some(date) = matches.get_one::<String>("date") {
        config.reference_date = Some(date.clone());
    }
    if let Some(level) = matches.get_one::<String>("trace").and_then(|t| TraceLevel::parse(t)) {
        config.trace = level;
    }
    if matches.get_flag("new-rank-names") {
        config.translate_old_rank_names = false;
    }
    Ok(config)
}

/// RUST_LOG wins over the configured level.
fn init_tracing(level: TraceLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_line_number(true))
        .with(filter)
        .init();
}

/// Accepts dd.mm.yyyy and dd.mm.yy.
fn parse_reference_date(value: &str) -> Result<NaiveDate, PromotionError> {
    let value = value.trim();
    let format = match value.rsplit('.').next().map(str::len) {
        Some(4) => "%d.%m.%Y",
        Some(2) => "%d.%m.%y",
        _ => return Err(PromotionError::InvalidReferenceDate(value.to_string())),
    };
    NaiveDate::parse_from_str(value, format)
        .map_err(|_| PromotionError::InvalidReferenceDate(value.to_string()))
}

fn read_table_from_reader<R: Read>(reader: R) -> Result<RawTable, PromotionError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(record.iter().map(|value| value.to_string()).collect());
    }

    Ok(RawTable { headers, rows })
}

fn read_table(file_path: &str) -> Result<RawTable> {
    let file =
        File::open(file_path).with_context(|| format!("Failed to read file: {}", file_path))?;
    let table = read_table_from_reader(file)
        .with_context(|| format!("Failed to parse CSV: {}", file_path))?;
    Ok(table)
}

fn write_report_to<W: Write>(
    analysis: &PromotionAnalysis,
    mut out: W,
) -> Result<(), PromotionError> {
    out.write_all(UTF8_BOM.as_bytes())?;
    let mut writer = WriterBuilder::new().delimiter(DELIMITER).from_writer(out);

    let stamp = format!("Stichtag:{}", analysis.reference_date.format("%d.%m.%Y"));
    writer.write_record([
        "Nachname",
        "Vorname",
        "akt. Dienstgrad",
        "Erfüllt Voraussetzungen für",
        "Dienstzeit insg.",
        stamp.as_str(),
    ])?;

    for row in &analysis.rows {
        let eligible = row.eligible_ranks_joined();
        let tenure = row.tenure_label();
        writer.write_record([
            row.last_name.as_str(),
            row.first_name.as_str(),
            row.current_rank.as_str(),
            eligible.as_str(),
            tenure.as_str(),
            "",
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn write_report(analysis: &PromotionAnalysis, file_path: &str) -> Result<()> {
    let file = File::create(file_path)
        .with_context(|| format!("Failed to create file: {}", file_path))?;
    write_report_to(analysis, file)?;
    Ok(())
}

fn run(config: &Config) -> Result<()> {
    if !Path::new(&config.input).is_file() {
        return Err(PromotionError::InputNotFound(config.input.clone()).into());
    }

    let reference = match &config.reference_date {
        Some(value) => parse_reference_date(value)?,
        None => chrono::Local::now().date_naive(),
    };
    info!("Reference date: {}", reference.format("%d.%m.%Y"));

    println!("📂 Reading personnel data from: {}", config.input);
    let table = read_table(&config.input)?;
    let schema = TableSchema::from_headers(&table.headers)?;
    let normalized = Normalizer::new(&schema, reference).normalize_table(&table)?;

    println!("   ✅ Found {} records", normalized.persons.len());
    if !normalized.warnings.is_empty() {
        println!("   ⚠️  {} data quality warnings (see log output)", normalized.warnings.len());
    }

    let analyzer = PromotionAnalyzer::new(reference, config.translate_old_rank_names);
    let analysis = analyzer.analyze_all(&normalized.persons);

    write_report(&analysis, &config.output)?;
    print_summary(&analysis, &config.output);
    Ok(())
}

fn print_summary(analysis: &PromotionAnalysis, output: &str) {
    let eligible = analysis
        .rows
        .iter()
        .filter(|row| !row.eligible_ranks.is_empty())
        .count();

    println!("\n📊 SUMMARY (reference date {})", analysis.reference_date.format("%d.%m.%Y"));
    println!("==========");
    println!("   Checked: {}", analysis.rows.len());
    println!("   Eligible for promotion: {}", eligible);
    if !analysis.lookup_failures.is_empty() {
        println!("   ❌ Skipped (unknown rank): {}", analysis.lookup_failures.len());
        for failure in &analysis.lookup_failures {
            println!("      - {}", failure);
        }
    }
    println!("\n✅ Results written to: {}", output);
}

/// Logs the failure and leaves a trace file for later inspection.
fn report_failure(err: &anyhow::Error, error_log: &str) {
    error!("{:#}", err);
    eprintln!("❌ Error: {:#}", err);
    eprintln!("   Run with --help for usage.");
    if let Err(write_err) = fs::write(error_log, format!("{:?}\n", err)) {
        eprintln!("   Could not write {}: {}", error_log, write_err);
    }
}

fn main() -> ExitCode {
    let matches = cli().get_matches();

    let config = match load_config(&matches) {
        Ok(config) => config,
        Err(e) => {
            report_failure(&e, &Config::default().error_log);
            return ExitCode::FAILURE;
        }
    };

    if matches.get_flag("init-config") {
        let config_file = matches
            .get_one::<String>("config")
            .map(String::as_str)
            .unwrap_or(DEFAULT_CONFIG_FILE);
        return match config.save_to_file(config_file) {
            Ok(()) => {
                println!("📝 Wrote configuration file: {}", config_file);
                ExitCode::SUCCESS
            }
            Err(e) => {
                report_failure(&e, &config.error_log);
                ExitCode::FAILURE
            }
        };
    }

    init_tracing(config.trace);
    info!(
        "Input: {}, output: {}, trace: {:?}",
        config.input, config.output, config.trace
    );

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_failure(&e, &config.error_log);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "\
Vorname;Nachname;Geburtsdatum;Geschlecht;Personal-Nr.;Einstellungsdatum;Art/Abteilung 1;Von 1;Bis 1;Abk. Dienstgrad 1;Von 1;Bis 1;Lehrgangsbezeichnung 1;Von 1;Bis 1;Status 1
Max;Mustermann;01.01.1990;männlich;1;;Einsatzabteilung FF;01.01.2023;;FMA;01.01.2023;;Qualifikationsstufe Einsatzfähigkeit;01.01.2023;01.01.2023;Bestanden
Erika;Muster;02.02.1992;weiblich;2;01.03.2010;Einsatzabteilung FF;01.03.2010;;
Otto;Normal;03.03.1970;männlich;3;;Einsatzabteilung FF;01.01.2000;;Kommandant;01.01.2015;;
";

    fn report_for(reference: &str) -> String {
        let reference = parse_reference_date(reference).unwrap();
        let table = read_table_from_reader(EXPORT.as_bytes()).unwrap();
        let schema = TableSchema::from_headers(&table.headers).unwrap();
        let normalized = Normalizer::new(&schema, reference).normalize_table(&table).unwrap();
        let analysis = PromotionAnalyzer::new(reference, true).analyze_all(&normalized.persons);
        let mut out = Vec::new();
        write_report_to(&analysis, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_reference_date() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(parse_reference_date("01.03.2024").unwrap(), expected);
        assert_eq!(parse_reference_date("01.03.24").unwrap(), expected);
        assert!(parse_reference_date("2024-03-01").is_err());
        assert!(parse_reference_date("31.02.2024").is_err());
    }

    #[test]
    fn test_read_table_keeps_duplicate_headers_and_ragged_rows() {
        let table = read_table_from_reader(EXPORT.as_bytes()).unwrap();
        assert_eq!(table.headers.len(), 16);
        assert_eq!(table.headers.iter().filter(|h| h.as_str() == "Von 1").count(), 3);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[1].len(), 10);
    }

    #[test]
    fn test_report_layout() {
        let report = report_for("01.01.2024");
        assert!(report.starts_with(UTF8_BOM));
        let lines: Vec<&str> = report.trim_start_matches(UTF8_BOM).lines().collect();
        assert_eq!(
            lines[0],
            "Nachname;Vorname;akt. Dienstgrad;Erfüllt Voraussetzungen für;Dienstzeit insg.;Stichtag:01.01.2024"
        );
        assert_eq!(lines[1], "Mustermann;Max;FMA;FM;1.00 Jahre;");
        // no rank recorded: base rank assumed
        assert_eq!(lines[2], "Muster;Erika;FFA;;13.85 Jahre;");
        // unknown rank: skipped
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_report_is_reproducible() {
        assert_eq!(report_for("01.01.24"), report_for("01.01.2024"));
    }
}
