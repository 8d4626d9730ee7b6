use crate::services::chat_service::ChatController;

pub fn show_config(controller: &ChatController) {
    let config = controller.client().config();
    println!("endpoint     {}", controller.client().completions_url());
    println!("model        {}", config.model);
    println!("temperature  {}", config.temperature);
    println!("max_tokens   {}", config.max_tokens);
    println!(
        "api key      {}",
        if config.api_key.is_some() { "set" } else { "not set" }
    );
    println!(
        "dark mode    {}",
        if controller.dark_mode() { "on" } else { "off" }
    );
}

pub fn toggle_theme(controller: &mut ChatController) {
    let enabled = !controller.dark_mode();
    controller.set_dark_mode(enabled);
    println!("Dark mode {}", if enabled { "on" } else { "off" });
}
