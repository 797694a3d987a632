
fn main() {
    chameleon_lib::run()
}
