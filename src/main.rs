use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgAction, Command};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use scribe_options::{merge_raw, unify_sources};
use scribe_studio::{AppConfig, BatchProcessor, TranscriptionPipeline};

fn cli() -> Command {
    let command = Command::new("scribe-studio")
        .version(env!("CARGO_PKG_VERSION"))
        .author("TigreRoll")
        .about("Transcribe media through AssemblyAI or Whisper with normalized options")
        .arg(
            Arg::new("inputs")
                .value_name("INPUT")
                .help("Audio/video URLs, files or directories")
                .num_args(0..)
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("provider")
                .short('p')
                .long("provider")
                .value_name("NAME")
                .help("Transcription vendor: assemblyai or whisper"),
        )
        .arg(
            Arg::new("options")
                .long("options")
                .value_name("FILE")
                .help("JSON file with raw transcription/client options"),
        )
        .arg(
            Arg::new("language-code")
                .short('l')
                .long("language-code")
                .value_name("CODE")
                .help("Pin the spoken language (disables language detection)"),
        )
        .arg(
            Arg::new("speaker-labels")
                .long("speaker-labels")
                .help("Enable speaker diarization")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("word-boost")
                .long("word-boost")
                .value_name("WORDS")
                .help("Comma or newline separated vocabulary to boost"),
        )
        .arg(
            Arg::new("custom-spelling")
                .long("custom-spelling")
                .value_name("RULE")
                .help("Spelling rule like 'Gettleman, Getleman => Gettelman' (repeatable)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("subtitle-formats")
                .long("subtitle-formats")
                .value_name("FORMATS")
                .help("Subtitle exports: srt, vtt, txt (comma separated)"),
        )
        .arg(
            Arg::new("search")
                .long("search")
                .value_name("WORDS")
                .help("Comma separated words to look up in each transcript"),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .help("Output directory for payloads and subtitles"),
        )
        .arg(
            Arg::new("workers")
                .short('w')
                .long("workers")
                .value_name("NUM")
                .help("Number of concurrent transcriptions"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue),
        );

    #[cfg(feature = "api")]
    let command = command.arg(
        Arg::new("serve")
            .long("serve")
            .help("Run the HTTP API instead of a batch")
            .action(ArgAction::SetTrue),
    );

    command
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::load()?,
    };

    if matches.get_flag("verbose") {
        tracing_subscriber::fmt()
            .with_target(true)
            .with_thread_ids(true)
            .with_env_filter("debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_env_filter(config.logging.level.as_str())
            .init();
    }

    if let Some(workers) = matches.get_one::<String>("workers") {
        config.processing.max_workers = workers
            .parse()
            .with_context(|| format!("Invalid worker count: {}", workers))?;
    }
    if let Some(provider) = matches.get_one::<String>("provider") {
        config.processing.provider = provider.parse()?;
    }
    if let Some(dir) = matches.get_one::<String>("output-dir") {
        config.processing.output_dir = PathBuf::from(dir);
    }

    config.validate()?;
    info!("🚀 Scribe Studio starting...");
    info!("{}", config.summary());

    let pipeline = Arc::new(TranscriptionPipeline::from_config(&config)?);

    #[cfg(feature = "api")]
    {
        if matches.get_flag("serve") {
            let server = scribe_studio::api::ApiServer::new(pipeline, Arc::new(config));
            return server.start().await;
        }
    }

    let inputs: Vec<String> = matches
        .get_many::<String>("inputs")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    if inputs.is_empty() {
        return Err(anyhow!("No inputs given; pass URLs, files or directories"));
    }

    let raw_config = request_config(&matches)?;
    let search_words: Vec<String> = matches
        .get_one::<String>("search")
        .map(|words| words.split(',').map(str::to_string).collect())
        .unwrap_or_default();

    let processor = BatchProcessor::new(pipeline, config.processing.max_workers)
        .with_supported_extensions(config.processing.supported_extensions.clone())
        .with_search_words(search_words);

    let cancel = processor.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Interrupt received, cancelling outstanding transcriptions");
            cancel.cancel();
        }
    });

    let results = processor
        .process_inputs(&inputs, &raw_config, &config.processing.output_dir)
        .await?;

    info!(
        "🎉 Processing completed in {:.2}s",
        results.total_time.as_secs_f64()
    );
    info!("✅ Successful: {}", results.successful);
    info!("❌ Failed: {}", results.failed);
    info!(
        "📊 Success rate: {:.1}%",
        if results.total > 0 {
            results.successful as f64 / results.total as f64 * 100.0
        } else {
            0.0
        }
    );

    if results.failed > 0 {
        return Err(anyhow!("{} of {} inputs failed", results.failed, results.total));
    }

    Ok(())
}

/// Raw config from `--options` with the convenience flags layered on top
fn request_config(matches: &clap::ArgMatches) -> Result<Value> {
    let base = match matches.get_one::<String>("options") {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Cannot read options file {}", path))?;
            let value: Value = serde_json::from_str(&text)
                .with_context(|| format!("Options file {} is not valid JSON", path))?;
            unify_sources(&value)
        }
        None => json!({}),
    };

    let mut transcription = Map::new();
    if let Some(code) = matches.get_one::<String>("language-code") {
        transcription.insert("language_code".to_string(), json!(code));
    }
    if matches.get_flag("speaker-labels") {
        transcription.insert("speaker_labels".to_string(), json!(true));
    }
    if let Some(words) = matches.get_one::<String>("word-boost") {
        transcription.insert("word_boost".to_string(), json!(words));
    }
    if let Some(rules) = matches.get_many::<String>("custom-spelling") {
        let lines: Vec<&str> = rules.map(String::as_str).collect();
        transcription.insert("custom_spelling".to_string(), json!(lines.join("\n")));
    }

    let mut client = Map::new();
    if let Some(formats) = matches.get_one::<String>("subtitle-formats") {
        client.insert("subtitleFormats".to_string(), json!(formats));
    }

    let flags = json!({
        "transcriptionOptions": transcription,
        "clientOptions": client,
    });

    Ok(merge_raw(&base, &flags))
}
