/// Errors produced when constructing a limiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LimitError {
    /// The requested ceiling cannot admit any work.
    #[error("cannot create limiter with max equal to 0")]
    InvalidConfiguration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_describes_invalid_configuration() {
        assert_eq!(
            LimitError::InvalidConfiguration.to_string(),
            "cannot create limiter with max equal to 0"
        );
    }
}
