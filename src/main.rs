fn main() {
    if let Err(err) = alarmkit_lib::run() {
        eprintln!("alarmkit: {err:#}");
        std::process::exit(1);
    }
}
