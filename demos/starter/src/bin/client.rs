//! Tally Starter Kit - Client Side

fn main() {
    #[cfg(target_arch = "wasm32")]
    {
        use starter::routes::Home;

        #[cfg(feature = "wasm")]
        console_error_panic_hook::set_once();

        if let Err(err) = tally::hydrate::hydrate(Home::default()) {
            web_sys::console::error_2(&"Failed to hydrate page".into(), &err);
        }
    }
}
