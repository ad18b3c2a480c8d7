use std::process::exit;

use clap::Parser;

use analogtv::runner::{self, RunConfig};
use analogtv::Error;

/// Shows images or videos like they are on an old TV screen.
///
/// Based on the analogtv hack written by Trevor Blackwell
/// (https://tlb.org/) from XScreenSaver (https://www.jwz.org/xscreensaver/).
#[derive(Parser)]
#[command(name = "analogtv", version, about, verbatim_doc_comment)]
struct Cli {
    /// Signal sources: still images, video files, or special sources:
    ///   :cam or :cam:N          camera N (default 0)
    ///   :bars or :bars:logo.png SMPTE color bars, optionally with a logo
    #[arg(long = "in", required = true, num_args = 1.., value_name = "SRC", verbatim_doc_comment)]
    inputs: Vec<String>,

    /// Where to output video, all outputs are written simultaneously:
    ///   :highgui   a window (needs the `window` build feature)
    ///   anything else is a video file (mp4 or avi)
    #[arg(long = "out", required = true, num_args = 1.., value_name = "DST", verbatim_doc_comment)]
    outputs: Vec<String>,

    /// Scheduler: `:random[:duration=secs][:powerup][:fixsettings][:fps=n]`
    /// or a path to a JSON scenario file
    #[arg(long, value_name = "CTL")]
    control: String,

    /// Output size; defaults to the size of the largest input image
    #[arg(long, num_args = 2, value_names = ["WIDTH", "HEIGHT"])]
    size: Vec<usize>,

    /// Random seed, or 0 to seed from the clock
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Log verbosity from 0 to 5
    #[arg(long, default_value_t = 0)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    };
    if let Ok(handle) = flexi_logger::Logger::try_with_str(level).and_then(|l| l.start()) {
        // The logger shuts down when its handle drops; keep it for the
        // lifetime of the process.
        std::mem::forget(handle);
    }
}

fn main() {
    let cli = Cli::try_parse().unwrap_or_else(|e| {
        use clap::error::ErrorKind;
        let _ = e.print();
        match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => exit(0),
            _ => exit(-1),
        }
    });

    init_logging(cli.verbose);

    let size = match cli.size.as_slice() {
        [] => None,
        &[w, h] => {
            if w <= 64 || h <= 64 {
                eprintln!("output size should be bigger than 64x64");
                exit(-1);
            }
            Some((w, h))
        }
        _ => unreachable!("clap enforces two values"),
    };

    let cfg = RunConfig {
        sources: cli.inputs,
        outputs: cli.outputs,
        control: cli.control,
        size,
        seed: cli.seed,
    };

    if let Err(e) = runner::run(&cfg) {
        if e.downcast_ref::<Error>().is_some() {
            eprintln!("{e}");
        } else {
            eprintln!("error: {e:#}");
        }
        exit(1);
    }
}
