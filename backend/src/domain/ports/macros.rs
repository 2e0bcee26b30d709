//! Helper macro for port error enums whose variants each carry a message.

/// Declares an error enum of `Variant { message: String }` arms, each with
/// a `thiserror` display string and a snake_case constructor taking
/// `impl Into<String>`.
macro_rules! define_port_error {
    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident { message: String } => $display:literal
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($display)]
                $variant { message: String },
            )*
        }

        impl $name {
            $(
                ::paste::paste! {
                    pub fn [<$variant:snake>](message: impl Into<String>) -> Self {
                        Self::$variant { message: message.into() }
                    }
                }
            )*
        }
    };
}

pub(crate) use define_port_error;

#[cfg(test)]
mod tests {
    use rstest::rstest;

    define_port_error! {
        pub enum RelayError {
            Refused { message: String } => "refused: {message}",
            TimedOut { message: String } => "timed out: {message}",
        }
    }

    #[rstest]
    fn constructors_accept_str_and_string() {
        assert_eq!(
            RelayError::refused("duplicate completion").to_string(),
            "refused: duplicate completion"
        );
        assert_eq!(
            RelayError::timed_out(String::from("after 3s")),
            RelayError::TimedOut {
                message: "after 3s".to_owned()
            }
        );
    }
}
