fn main() {
    #[cfg(not(target_arch = "wasm32"))]
    goo_sim::start();
}
