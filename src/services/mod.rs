pub mod message;

pub use message::MessageService;

use crate::handler::Application;

/// Build the application with every published operation registered.
pub fn application(namespace: &str) -> Application {
    MessageService.register(Application::new(message::SERVICE_NAME, namespace))
}
