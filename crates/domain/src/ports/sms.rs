use crate::ports::BoxFuture;
use crate::sms::SmsSendResult;

/// An SMS provider. `send` never fails: transport and provider errors are
/// folded into the returned per-number outcomes.
pub trait SmsGateway: Send + Sync {
    fn id(&self) -> &'static str;

    fn is_configured(&self) -> bool;

    fn send<'a>(&'a self, numbers: &'a [String], message: &'a str)
    -> BoxFuture<'a, SmsSendResult>;
}
