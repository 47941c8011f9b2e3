use crate::handler::Application;
use crate::soap::SoapFault;
use crate::types::{OperationDescriptor, ReturnDescriptor, Value, XsdType};

pub const SERVICE_NAME: &str = "MessageService";
pub const SEND_MESSAGE: &str = "send_message";

#[derive(Clone, Copy, Debug, Default)]
pub struct MessageService;

impl MessageService {
    pub fn send_message_descriptor() -> OperationDescriptor {
        OperationDescriptor::new(SEND_MESSAGE, ReturnDescriptor::Array(XsdType::String))
            .param("msg", XsdType::String)
            .param("count", XsdType::Long)
    }

    pub fn register(self, app: Application) -> Application {
        app.register(Self::send_message_descriptor(), |args| {
            let msg = args.string("msg").map_err(SoapFault::client)?;
            let count = args.long("count").map_err(SoapFault::client)?;
            Ok(Self::send_message(msg, count).map(Value::String).collect())
        })
    }

    /// Yields exactly one formatted line.
    ///
    /// `count` is accepted but does not influence the result; whether it was
    /// meant to repeat or truncate the message is unknown.
    pub fn send_message(msg: &str, _count: i64) -> impl Iterator<Item = String> {
        std::iter::once_with(move || format_message(msg))
    }
}

pub fn format_message(msg: &str) -> String {
    format!("Your message: {msg}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_message_hello() {
        let out: Vec<String> = MessageService::send_message("hello", 3).collect();
        assert_eq!(out, vec!["Your message: hello".to_string()]);
    }

    #[test]
    fn test_send_message_empty() {
        let out: Vec<String> = MessageService::send_message("", 0).collect();
        assert_eq!(out, vec!["Your message: ".to_string()]);
    }

    #[test]
    fn test_count_does_not_affect_output() {
        let msg = "ping <&> ünïcödé";
        let expected = vec![format!("Your message: {msg}")];
        for count in [i64::MIN, -1, 0, 1, 2, 1000, i64::MAX] {
            let out: Vec<String> = MessageService::send_message(msg, count).collect();
            assert_eq!(out, expected, "count = {count}");
        }
    }

    #[test]
    fn test_each_call_is_a_fresh_sequence() {
        let mut first = MessageService::send_message("again", 1);
        let second: Vec<String> = MessageService::send_message("again", 1).collect();
        assert_eq!(first.next().as_deref(), Some("Your message: again"));
        assert_eq!(first.next(), None);
        assert_eq!(second, vec!["Your message: again".to_string()]);
    }

    #[test]
    fn test_descriptor() {
        let op = MessageService::send_message_descriptor();
        assert_eq!(op.name, "send_message");
        let names: Vec<_> = op.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["msg", "count"]);
        assert_eq!(op.returns, ReturnDescriptor::Array(XsdType::String));
    }
}
