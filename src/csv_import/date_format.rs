//! Date formats in the `dd/MM/yyyy` style used by import sources.

use time::{
    Date,
    format_description::{self, OwnedFormatItem},
};

use crate::Error;

/// A compiled import source date format.
#[derive(Debug, Clone)]
pub struct DateFormat {
    items: OwnedFormatItem,
}

impl DateFormat {
    /// Compile `format`.
    ///
    /// The tokens `yyyy`, `MM`, `M`, `dd`, `d`, `MMM` and `MMMM` stand for the
    /// year, zero-padded month, month, zero-padded day, day, short month name
    /// and full month name. Every other character is matched literally.
    ///
    /// # Errors
    /// Returns [Error::InvalidImportConfig] if the format does not describe a
    /// complete date.
    pub fn new(format: &str) -> Result<Self, Error> {
        let description = to_format_description(format);

        if !["[year", "[month", "[day"]
            .iter()
            .all(|component| description.contains(component))
        {
            return Err(Error::InvalidImportConfig(format!(
                "the date format \"{format}\" needs a year, a month and a day"
            )));
        }

        let items = format_description::parse_owned::<1>(&description).map_err(|error| {
            Error::InvalidImportConfig(format!("invalid date format \"{format}\": {error}"))
        })?;

        Ok(Self { items })
    }

    /// Parse `text` as a date, `None` if it does not match the format.
    pub fn parse(&self, text: &str) -> Option<Date> {
        Date::parse(text.trim(), &self.items).ok()
    }
}

fn to_format_description(format: &str) -> String {
    let chars = format.chars().collect::<Vec<_>>();
    let mut description = String::with_capacity(format.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let run = chars[i..].iter().take_while(|&&other| other == c).count();

        let component = match (c, run) {
            ('y', 4) => Some("[year]"),
            ('M', 4) => Some("[month repr:long case_sensitive:false]"),
            ('M', 3) => Some("[month repr:short case_sensitive:false]"),
            ('M', 2) => Some("[month]"),
            ('M', 1) => Some("[month padding:none]"),
            ('d', 2) => Some("[day]"),
            ('d', 1) => Some("[day padding:none]"),
            _ => None,
        };

        match component {
            Some(component) => description.push_str(component),
            None => {
                for _ in 0..run {
                    if c == '[' {
                        description.push_str("[[");
                    } else {
                        description.push(c);
                    }
                }
            }
        }

        i += run;
    }

    description
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::{DateFormat, to_format_description};

    #[test]
    fn converts_tokens() {
        assert_eq!(
            to_format_description("dd/MM/yyyy"),
            "[day]/[month]/[year]"
        );
        assert_eq!(
            to_format_description("d-M-yyyy"),
            "[day padding:none]-[month padding:none]-[year]"
        );
    }

    #[test]
    fn parses_padded_dates() {
        let format = DateFormat::new("dd/MM/yyyy").unwrap();

        assert_eq!(format.parse("05/03/2025"), Some(date!(2025 - 03 - 05)));
    }

    #[test]
    fn parses_iso_dates() {
        let format = DateFormat::new("yyyy-MM-dd").unwrap();

        assert_eq!(format.parse("2025-12-31"), Some(date!(2025 - 12 - 31)));
    }

    #[test]
    fn parses_short_month_names() {
        let format = DateFormat::new("dd MMM yyyy").unwrap();

        assert_eq!(format.parse("07 Feb 2024"), Some(date!(2024 - 02 - 07)));
    }

    #[test]
    fn parses_long_month_names() {
        let format = DateFormat::new("d MMMM yyyy").unwrap();

        assert_eq!(format.parse("7 February 2024"), Some(date!(2024 - 02 - 07)));
    }

    #[test]
    fn mismatched_text_is_none() {
        let format = DateFormat::new("dd/MM/yyyy").unwrap();

        assert_eq!(format.parse("2025-03-05"), None);
        assert_eq!(format.parse("31/02/2025"), None);
    }

    #[test]
    fn incomplete_format_is_an_error() {
        assert!(DateFormat::new("MM/yyyy").is_err());
    }
}
