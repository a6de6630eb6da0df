fn main() {
    if let Err(e) = record_replay_lib::run() {
        eprintln!("record-replay: {:#}", e);
        std::process::exit(1);
    }
}
