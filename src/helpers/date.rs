//! Date helper functions
//!
//! Publication dates are displayed with date-fns style patterns (`PP`,
//! `dd/MM/yyyy`, `d 'de' MMMM`) in the site locale and timezone. Patterns are
//! translated to chrono format strings and formatted with chrono's locale data.

use chrono::{DateTime, FixedOffset, Locale, TimeZone};

use crate::config::SiteConfig;

/// Locales dates can be displayed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateLocale {
    PtBr,
    EnUs,
}

impl DateLocale {
    /// Pick a locale from a language tag, English for anything unknown
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.to_ascii_lowercase().replace('_', "-");
        if tag == "pt" || tag.starts_with("pt-") {
            DateLocale::PtBr
        } else {
            DateLocale::EnUs
        }
    }

    fn chrono(self) -> Locale {
        match self {
            DateLocale::PtBr => Locale::pt_BR,
            DateLocale::EnUs => Locale::en_US,
        }
    }

    /// Localized date format for `P` (1) through `PPPP` (4)
    fn localized_format(self, width: usize) -> &'static str {
        match (self, width) {
            (DateLocale::PtBr, 1) => "%d/%m/%Y",
            (DateLocale::PtBr, 2) => "%-d %b %Y",
            (DateLocale::PtBr, 3) => "%-d de %B de %Y",
            (DateLocale::PtBr, _) => "%A, %-d de %B de %Y",
            (DateLocale::EnUs, 1) => "%m/%d/%Y",
            (DateLocale::EnUs, 2) => "%b %-d, %Y",
            (DateLocale::EnUs, 3) => "%B %-d, %Y",
            (DateLocale::EnUs, _) => "%A, %B %-d, %Y",
        }
    }
}

/// Formats publication dates for display, once per fetched post
#[derive(Debug, Clone)]
pub struct DateFormatter {
    format: String,
    locale: DateLocale,
    tz: chrono_tz::Tz,
}

impl DateFormatter {
    pub fn new(pattern: &str, locale: DateLocale, tz: chrono_tz::Tz) -> Self {
        Self {
            format: date_fns_to_chrono_format(pattern, locale),
            locale,
            tz,
        }
    }

    pub fn from_config(config: &SiteConfig) -> Self {
        Self::new(
            &config.date_format,
            DateLocale::from_tag(&config.language),
            config.tz(),
        )
    }

    /// Format a canonical timestamp in the site timezone
    pub fn format(&self, date: &DateTime<FixedOffset>) -> String {
        date.with_timezone(&self.tz)
            .format_localized(&self.format, self.locale.chrono())
            .to_string()
    }
}

/// Format a date with a date-fns style pattern
///
/// # Examples
/// ```ignore
/// format_date(&date, "PP", DateLocale::PtBr) // -> "15 mar 2021"
/// ```
pub fn format_date<Tz: TimeZone>(date: &DateTime<Tz>, pattern: &str, locale: DateLocale) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let format = date_fns_to_chrono_format(pattern, locale);
    date.format_localized(&format, locale.chrono()).to_string()
}

/// Convert a date-fns pattern to a chrono format string
fn date_fns_to_chrono_format(pattern: &str, locale: DateLocale) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        // Quoted literal; '' is an escaped quote
        if c == '\'' {
            i += 1;
            if chars.get(i) == Some(&'\'') {
                out.push('\'');
                i += 1;
                continue;
            }
            while i < chars.len() {
                if chars[i] == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        out.push('\'');
                        i += 2;
                        continue;
                    }
                    break;
                }
                push_literal(&mut out, chars[i]);
                i += 1;
            }
            i += 1;
            continue;
        }

        if !c.is_ascii_alphabetic() {
            push_literal(&mut out, c);
            i += 1;
            continue;
        }

        let mut width = 1;
        while chars.get(i + width) == Some(&c) {
            width += 1;
        }
        i += width;

        let token = match (c, width) {
            ('P', _) => locale.localized_format(width),
            ('d', 1) => "%-d",
            ('d', _) => "%d",
            ('M', 1) => "%-m",
            ('M', 2) => "%m",
            ('M', 3) => "%b",
            ('M', _) => "%B",
            ('y', 2) => "%y",
            ('y', _) => "%Y",
            ('E', 1..=3) => "%a",
            ('E', _) => "%A",
            ('H', 1) => "%-H",
            ('H', _) => "%H",
            ('m', 1) => "%-M",
            ('m', _) => "%M",
            ('s', 1) => "%-S",
            ('s', _) => "%S",
            (other, _) => {
                for _ in 0..width {
                    push_literal(&mut out, other);
                }
                continue;
            }
        };
        out.push_str(token);
    }

    out
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

/// Parse a repository timestamp (`2021-03-15T19:25:28+0000` or RFC 3339)
pub fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z"))
        .ok()
}

/// Format a date in ISO 8601 / XML format, for `<time datetime>`
pub fn date_xml(date: &DateTime<FixedOffset>) -> String {
    date.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DateTime<FixedOffset> {
        parse_timestamp("2021-03-15T19:25:28+0000").unwrap()
    }

    #[test]
    fn test_pp_in_brazilian_portuguese() {
        let formatter = DateFormatter::new("PP", DateLocale::PtBr, chrono_tz::America::Sao_Paulo);
        assert_eq!(formatter.format(&sample()), "15 mar 2021");
    }

    #[test]
    fn test_date_fns_to_chrono_format() {
        assert_eq!(date_fns_to_chrono_format("PP", DateLocale::PtBr), "%-d %b %Y");
        assert_eq!(date_fns_to_chrono_format("dd/MM/yyyy", DateLocale::PtBr), "%d/%m/%Y");
        assert_eq!(
            date_fns_to_chrono_format("d 'de' MMMM", DateLocale::PtBr),
            "%-d de %B"
        );
        assert_eq!(date_fns_to_chrono_format("HH:mm '100%'", DateLocale::EnUs), "%H:%M 100%%");
    }

    #[test]
    fn test_localized_widths() {
        let date = sample();
        assert_eq!(format_date(&date, "P", DateLocale::PtBr), "15/03/2021");
        assert_eq!(format_date(&date, "PPP", DateLocale::PtBr), "15 de março de 2021");
        assert_eq!(format_date(&date, "PP", DateLocale::EnUs), "Mar 15, 2021");
        assert_eq!(format_date(&date, "PPP", DateLocale::EnUs), "March 15, 2021");
        assert_eq!(
            format_date(&date, "PPPP", DateLocale::EnUs),
            "Monday, March 15, 2021"
        );
    }

    #[test]
    fn test_explicit_tokens_and_quotes() {
        let date = sample();
        assert_eq!(format_date(&date, "yyyy-MM-dd HH:mm", DateLocale::EnUs), "2021-03-15 19:25");
        assert_eq!(format_date(&date, "d 'de' MMM yy", DateLocale::PtBr), "15 de mar 21");
        assert_eq!(format_date(&date, "'it''s' EEE", DateLocale::EnUs), "it's Mon");
    }

    #[test]
    fn test_timezone_shifts_the_day() {
        let late = parse_timestamp("2021-03-16T01:00:00+0000").unwrap();
        let formatter = DateFormatter::new("PP", DateLocale::PtBr, chrono_tz::America::Sao_Paulo);
        assert_eq!(formatter.format(&late), "15 mar 2021");
        let utc = DateFormatter::new("PP", DateLocale::PtBr, chrono_tz::UTC);
        assert_eq!(utc.format(&late), "16 mar 2021");
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2021-03-15T19:25:28+0000").is_some());
        assert!(parse_timestamp("2021-03-15T19:25:28+00:00").is_some());
        assert!(parse_timestamp("2021-03-15T19:25:28Z").is_some());
        assert!(parse_timestamp("15/03/2021").is_none());
    }

    #[test]
    fn test_locale_from_tag() {
        assert_eq!(DateLocale::from_tag("pt-BR"), DateLocale::PtBr);
        assert_eq!(DateLocale::from_tag("pt_br"), DateLocale::PtBr);
        assert_eq!(DateLocale::from_tag("en"), DateLocale::EnUs);
        assert_eq!(DateLocale::from_tag("fr"), DateLocale::EnUs);
    }

    #[test]
    fn test_date_xml() {
        assert_eq!(date_xml(&sample()), "2021-03-15T19:25:28+00:00");
    }
}
