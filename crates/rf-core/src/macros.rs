/// Declare an AST enum with the derives every node carries.
#[macro_export]
macro_rules! common_enum {
    ($(#[$attr:meta])* $vis:vis enum $name:ident $($rest:tt)*) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        $vis enum $name $($rest)*
    };
}

/// Declare an AST struct with the derives every node carries.
#[macro_export]
macro_rules! common_struct {
    ($(#[$attr:meta])* $vis:vis struct $name:ident $($rest:tt)*) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        $vis struct $name $($rest)*
    };
}

/// Return early with a type error.
#[macro_export]
macro_rules! type_bail {
    ($($arg:tt)*) => {
        return Err($crate::error::Error::type_error(format!($($arg)*)))
    };
}

/// Return a type error unless the condition holds.
#[macro_export]
macro_rules! type_ensure {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err($crate::error::Error::type_error(format!($($arg)*)));
        }
    };
}
