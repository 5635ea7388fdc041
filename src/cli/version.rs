/// Display version information
pub fn execute() {
    println!("ghostwire {}", env!("CARGO_PKG_VERSION"));
    println!("Virtual user provisioning for protocol bridges");
}
