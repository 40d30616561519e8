fn main() {
    driveplayer_lib::run()
}
