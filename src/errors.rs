use rusoto_core::RusotoError;
use std::error::Error as StdError;

error_chain! {
    foreign_links {
        Clap(::clap::Error);
        Io(::std::io::Error);
        Json(::serde_json::Error);
    }

    errors {
        AuthenticationFailure(detail: String) {
            description("authentication failed")
            display("authentication failed: {}", detail)
        }
        ResourceNotFound(kind: &'static str, name_tag: String) {
            description("resource not found")
            display("no {} found with Name tag: {}", kind, name_tag)
        }
        RuleAlreadyExists {
            description("rule already exists")
            display("Rule already exists.")
        }
        RuleNotFound {
            description("rule does not exist")
            display("The rule you are trying to remove does not exist.")
        }
        ProviderApi(operation: String, detail: String) {
            description("provider API call failed")
            display("failed to {}: {}", operation, detail)
        }
        ExternalLookup(detail: String) {
            description("public IP lookup failed")
            display("public IP lookup failed: {}", detail)
        }
    }
}

impl Error {
    /// Informational outcomes of the rule commands, reported without failing the process.
    pub fn is_informational(&self) -> bool {
        match *self.kind() {
            ErrorKind::RuleAlreadyExists | ErrorKind::RuleNotFound => true,
            _ => false,
        }
    }
}

pub fn api_error<E>(operation: &str, err: RusotoError<E>) -> Error
where
    E: StdError + 'static,
{
    match err {
        RusotoError::Credentials(e) => ErrorKind::AuthenticationFailure(e.to_string()).into(),
        RusotoError::Unknown(ref resp) if is_auth_status(resp.status.as_u16()) => {
            ErrorKind::AuthenticationFailure(format!("{}: {}", operation, resp.body_as_str()))
                .into()
        }
        RusotoError::Unknown(ref resp) => {
            ErrorKind::ProviderApi(operation.to_owned(), resp.body_as_str().to_string()).into()
        }
        e => ErrorKind::ProviderApi(operation.to_owned(), e.to_string()).into(),
    }
}

fn is_auth_status(status: u16) -> bool {
    status == 401 || status == 403
}
