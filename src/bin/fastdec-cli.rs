use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use std::fs;
use std::io::{self, BufWriter};

use fastdec::json_array_encoder::JsonArrayEncoder;
use fastdec::logging;
use fastdec::matrix::{self, Archive};
use fastdec::model::Model;
use fastdec::result_encoder::{ResultEncoder, UtteranceResult};
use fastdec::text_encoder::TextEncoder;
use fastdec::{DecodeOpts, LoadOpts, OutputType, Recognizer, Utterance};

fn main() -> Result<()> {
    let params = get_params()?;
    logging::init_with_default(logging::level_for_verbosity(params.verbose));
    match params.command {
        Command::Decode(args) => decode(args),
        Command::Info { model_path } => info(&model_path),
        Command::ComputeLikes {
            model_path,
            input_path,
        } => compute_likes(&model_path, &input_path),
    }
}

#[derive(Parser, Debug)]
#[command(name = "fastdec")]
#[command(about = "Beam-search decoding over a weighted decoding graph")]
struct Params {
    /// Raise the default log level (repeatable). `FASTDEC_LOG` takes precedence.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode every utterance of a JSON log-likelihood (or feature) archive.
    Decode(DecodeArgs),

    /// Print phone, pdf, transition and Gaussian counts of a model file.
    Info {
        #[arg(short = 'm', long = "model")]
        model_path: String,
    },

    /// Evaluate the acoustic model on a feature archive and write a log-likelihood archive.
    ComputeLikes {
        #[arg(short = 'm', long = "model")]
        model_path: String,

        #[arg(short = 'i', long = "input")]
        input_path: String,
    },
}

#[derive(Args, Debug)]
struct DecodeArgs {
    #[arg(short = 'm', long = "model")]
    model_path: String,

    #[arg(short = 'g', long = "graph")]
    graph_path: String,

    #[arg(short = 'w', long = "words")]
    word_symbols_path: Option<String>,

    /// JSON archive: utterance id -> matrix (log-likelihoods, or features with `--use-gmm`).
    #[arg(short = 'i', long = "input")]
    input_path: String,

    /// Treat the input as features and score them with the model file's GMM.
    #[arg(long = "use-gmm", default_value_t = false)]
    use_gmm: bool,

    /// JSON file with decode options; explicit flags below override it.
    #[arg(short = 'c', long = "config")]
    config_path: Option<String>,

    #[arg(long = "acoustic-scale")]
    acoustic_scale: Option<f32>,

    #[arg(short = 'b', long = "beam")]
    beam: Option<f32>,

    #[arg(long = "allow-partial")]
    allow_partial: Option<bool>,

    #[arg(
        short = 'o',
        long = "output-type",
        value_enum,
        default_value_t = OutputType::Json
    )]
    output_type: OutputType,
}

impl DecodeArgs {
    fn decode_opts(&self) -> Result<DecodeOpts> {
        let mut opts = match &self.config_path {
            Some(path) => {
                let json = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config '{path}'"))?;
                DecodeOpts::from_json(&json)
                    .with_context(|| format!("invalid config '{path}'"))?
            }
            None => DecodeOpts::default(),
        };
        if let Some(scale) = self.acoustic_scale {
            opts.acoustic_scale = scale;
        }
        if let Some(beam) = self.beam {
            opts.beam = beam;
        }
        if let Some(allow_partial) = self.allow_partial {
            opts.allow_partial = allow_partial;
        }
        opts.validate()?;
        Ok(opts)
    }
}

fn get_params() -> Result<Params> {
    Ok(Params::parse())
}

fn decode(args: DecodeArgs) -> Result<()> {
    let opts = args.decode_opts()?;
    let mut recognizer = Recognizer::load(&LoadOpts {
        model_path: args.model_path.clone(),
        graph_path: args.graph_path.clone(),
        word_symbols_path: args.word_symbols_path.clone(),
        load_am: args.use_gmm,
    })?;
    let archive = matrix::open_archive(&args.input_path)?;

    let stdout = io::stdout();
    let writer = BufWriter::new(stdout.lock());
    let mut encoder: Box<dyn ResultEncoder> = match args.output_type {
        OutputType::Json => Box::new(JsonArrayEncoder::new(writer)),
        OutputType::Text => Box::new(TextEncoder::new(writer)),
    };

    let run_res = decode_archive(&mut recognizer, &archive, &opts, args.use_gmm, &mut *encoder);
    let close_res = encoder.close().map_err(anyhow::Error::from);
    match (run_res, close_res) {
        (Ok(()), Ok(())) => Ok(()),
        (Ok(()), Err(close_err)) => Err(close_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => Err(err.context(close_err)),
    }
}

fn decode_archive(
    recognizer: &mut Recognizer,
    archive: &Archive,
    opts: &DecodeOpts,
    use_gmm: bool,
    encoder: &mut dyn ResultEncoder,
) -> Result<()> {
    for (utterance_id, matrix) in archive {
        let utterance = if use_gmm {
            Utterance::Features(matrix.view())
        } else {
            Utterance::LogLikelihoods(matrix.view())
        };
        let result = recognizer
            .decode(utterance, opts)
            .with_context(|| format!("failed to decode utterance '{utterance_id}'"))?;
        encoder.write_result(&UtteranceResult {
            utterance_id,
            result: &result,
        })?;
    }
    Ok(())
}

fn info(model_path: &str) -> Result<()> {
    let model = Model::open_optional_am(model_path)
        .with_context(|| format!("failed to load model '{model_path}'"))?;
    print!("{}", model.info());
    Ok(())
}

fn compute_likes(model_path: &str, input_path: &str) -> Result<()> {
    let model = Model::open(model_path, true)?;
    let am = model
        .am_gmm
        .context("model file has no acoustic model")?;
    let features = matrix::open_archive(input_path)?;

    let mut likes = Archive::new();
    for (utterance_id, feats) in &features {
        let loglikes = am
            .compute_loglikes(feats.view())
            .with_context(|| format!("failed to score utterance '{utterance_id}'"))?;
        likes.insert(utterance_id.clone(), loglikes);
    }
    tracing::info!(utterances = likes.len(), "computed log-likelihoods");

    let stdout = io::stdout();
    matrix::write_archive(stdout.lock(), &likes)?;
    Ok(())
}
