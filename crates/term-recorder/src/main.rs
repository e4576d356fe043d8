use term_recorder::Application;

fn main() {
    let code = Application::new().run();
    std::process::exit(code);
}
