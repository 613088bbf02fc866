use std::env;
use voxelview::ViewerConfig;

const USE_MESSAGE : &str = "\x1b[31mUsage: marker_summary <filename>\
    [-d <track_direction>] [-c <config.json>]\x1b[0m";

macro_rules! send_use_msg {
    () => {
        panic!("{}", USE_MESSAGE)
    };
}

/// Prints the track statistics and MSD tables of a marker
/// text file.
///
/// If `-d` is not specified, the track direction comes from
/// the configuration file given with `-c`, or is time (4).
///
/// # Example
///
/// ```text
/// marker_summary tracks.txt -d 2
/// ```
fn main() {
    let args : Vec<String> = env::args().collect();
    if args.len() < 2 { send_use_msg!(); }
    let filename = &args[1];
    let mut direction = None;
    let mut config_path = None;

    let mut rest = args.iter().skip(2);
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "-d" => {
                let value = rest.next().unwrap_or_else(|| send_use_msg!());
                direction = Some(value.parse::<usize>().unwrap_or_else(|_| send_use_msg!()));
            },
            "-c" => {
                config_path = Some(rest.next().unwrap_or_else(|| send_use_msg!()));
            },
            _ => send_use_msg!(),
        }
    }

    let config = match config_path {
        Some(path) => ViewerConfig::load(path).expect("Could not read the configuration"),
        None => ViewerConfig::default(),
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level)).init();

    let summary = voxelview::marker_summary(filename, direction.unwrap_or(config.track_direction))
        .expect("Failure reading the marker file");
    print!("{}", summary);
}
