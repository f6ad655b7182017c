fn main() {
    if let Err(err) = textfile_import::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
