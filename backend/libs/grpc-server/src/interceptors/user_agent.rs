use tonic::{Request, Status};

use super::Interceptor;
use crate::context::UserAgent;

/// Records the parsed `user-agent` header as a request extension
#[derive(Debug, Clone, Copy, Default)]
pub struct UserAgentInterceptor;

impl Interceptor for UserAgentInterceptor {
    fn intercept(&self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let user_agent = request
            .metadata()
            .get("user-agent")
            .and_then(|value| value.to_str().ok())
            .map(UserAgent::parse);

        if let Some(user_agent) = user_agent {
            request.extensions_mut().insert(user_agent);
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_user_agent() {
        let mut request = Request::new(());
        request
            .metadata_mut()
            .insert("user-agent", "grpc-go/1.62.1".parse().unwrap());

        let request = UserAgentInterceptor.intercept(request).unwrap();
        let ua = request.extensions().get::<UserAgent>().unwrap();
        assert_eq!(ua.product.as_deref(), Some("grpc-go"));
    }

    #[test]
    fn test_missing_header_is_fine() {
        let request = UserAgentInterceptor.intercept(Request::new(())).unwrap();
        assert!(request.extensions().get::<UserAgent>().is_none());
    }
}
