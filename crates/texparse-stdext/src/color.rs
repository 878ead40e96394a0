//! Terminal coloring
//!
//! Diagnostics are colored with the
//! [Colored crate](https://docs.rs/colored/latest/colored/), behind the `color` Cargo feature.
//! This module exposes a single [`Colorize`] trait. With the feature enabled it forwards
//! to the Colored crate; without it every method returns the input unchanged.
//!
//! ```
//! use texparse_stdext::color::Colorize;
//! println!["{}", "error".bold().bright_red()];
//! ```

#[cfg(feature = "color")]
pub type ColoredString = colored::ColoredString;

#[cfg(not(feature = "color"))]
pub type ColoredString = String;

macro_rules! colorize_impl {
    ( $( $method_name: ident, )+ ) => {
        /// Trait that provides coloring methods on strings.
        pub trait Colorize {
            $(
                fn $method_name(self) -> ColoredString;
            )+
        }
        #[cfg(feature="color")]
        impl Colorize for ColoredString {
            $(
                fn $method_name(self) -> ColoredString {
                    colored::Colorize::$method_name(self)
                }
            )+
        }
        #[cfg(feature="color")]
        impl Colorize for &str {
            $(
                fn $method_name(self) -> ColoredString {
                    colored::Colorize::$method_name(self)
                }
            )+
        }
        #[cfg(feature="color")]
        impl Colorize for String {
            $(
                fn $method_name(self) -> ColoredString {
                    colored::Colorize::$method_name(self.as_str())
                }
            )+
        }
        #[cfg(not(feature="color"))]
        impl Colorize for &str {
            $(
                fn $method_name(self) -> ColoredString {
                    self.to_string()
                }
            )+
        }
        #[cfg(not(feature="color"))]
        impl Colorize for String {
            $(
                fn $method_name(self) -> ColoredString {
                    self
                }
            )+
        }
    };
}

colorize_impl!(bold, bright_cyan, bright_red, bright_yellow,);
