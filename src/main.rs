fn main() {
    if let Err(e) = posture_gate_lib::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
