use std::env;
use std::fs::{self, File};
use std::io::Read;
use std::path::PathBuf;

use hlsmux::{Config, TransmuxEvent, Transmuxer};

const USAGE: &str = "usage: transmux_file <segment.ts>... [--out <dir>]";

/// Bytes handed to the transmuxer per push; not a multiple of the 188-byte
/// packet size.
const CHUNK_SIZE: usize = 64 * 1024 + 7;

fn main() -> hlsmux::Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let Some(input) = args.next() else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };
    let mut inputs = vec![PathBuf::from(input)];
    let mut out_dir = PathBuf::from("output");
    while let Some(arg) = args.next() {
        if arg == "--out" {
            let Some(dir) = args.next() else {
                eprintln!("{}", USAGE);
                std::process::exit(2);
            };
            out_dir = PathBuf::from(dir);
        } else {
            inputs.push(PathBuf::from(arg));
        }
    }
    fs::create_dir_all(&out_dir)?;

    let config = Config::from_env();
    println!("Config: {:?}", config);
    let mut transmuxer = Transmuxer::with_config(config);

    let mut segment_index = 0;
    let mut write_events = |events: Vec<TransmuxEvent>| -> std::io::Result<()> {
        for event in events {
            match event {
                TransmuxEvent::Metadata(tracks) => {
                    for track in tracks {
                        println!(
                            "Track {}: {} ({})",
                            track.id,
                            track.track_type,
                            track.codec.name()
                        );
                    }
                }
                TransmuxEvent::InitSegment(init) => {
                    let path = out_dir.join("init.mp4");
                    fs::write(&path, &init)?;
                    println!("Wrote {} ({} bytes)", path.display(), init.len());
                }
                TransmuxEvent::MediaSegment(segment) => {
                    let path = out_dir.join(format!("segment{}.m4s", segment_index));
                    fs::write(&path, &segment.data)?;
                    segment_index += 1;
                    for fragment in &segment.fragments {
                        println!(
                            "  {} track {}: {} samples from {}",
                            fragment.track_type,
                            fragment.track_id,
                            fragment.samples.len(),
                            fragment.base_media_decode_time
                        );
                    }
                    println!("Wrote {} ({} bytes)", path.display(), segment.data.len());
                }
                TransmuxEvent::Error(e) => eprintln!("Skipped input: {}", e),
            }
        }
        Ok(())
    };

    // one media segment per input file, as an HLS player would fetch them
    let mut buf = vec![0u8; CHUNK_SIZE];
    for input in &inputs {
        println!("Reading {}", input.display());
        let mut file = File::open(input)?;
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            write_events(transmuxer.push(&buf[..n])?)?;
        }
        write_events(transmuxer.flush()?)?;
    }
    write_events(transmuxer.end()?)?;

    Ok(())
}
