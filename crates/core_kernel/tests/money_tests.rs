//! Unit tests for the money module
//!
//! Tests cover strict and lenient parsing, input formatting for override
//! fields, display formatting, and the labor-rate conversion.

use core_kernel::{
    MoneyError, LABOR_RATE_PER_HOUR, format_amount, format_amount_input, labor_hours_for,
    parse_amount, parse_formatted_amount,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

mod strict_parsing {
    use super::*;

    #[test]
    fn test_parse_plain_amount() {
        assert_eq!(parse_amount("150").unwrap(), dec!(150));
        assert_eq!(parse_amount("150.75").unwrap(), dec!(150.75));
    }

    #[test]
    fn test_parse_strips_separators_and_symbol() {
        assert_eq!(parse_amount("$1,250.50").unwrap(), dec!(1250.50));
        assert_eq!(parse_amount("  2,000 ").unwrap(), dec!(2000));
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(matches!(parse_amount(""), Err(MoneyError::InvalidAmount(_))));
        assert!(matches!(parse_amount("   "), Err(MoneyError::InvalidAmount(_))));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_amount("12abc"), Err(MoneyError::InvalidAmount(_))));
    }

    #[test]
    fn test_parse_rejects_negative() {
        assert!(matches!(parse_amount("-5"), Err(MoneyError::Negative(_))));
    }
}

mod lenient_parsing {
    use super::*;

    #[test]
    fn test_formatted_value_reads_back() {
        assert_eq!(parse_formatted_amount("1,234.56"), dec!(1234.56));
    }

    #[test]
    fn test_empty_reads_as_zero() {
        assert_eq!(parse_formatted_amount(""), Decimal::ZERO);
        assert_eq!(parse_formatted_amount("abc"), Decimal::ZERO);
        assert_eq!(parse_formatted_amount("."), Decimal::ZERO);
    }

    #[test]
    fn test_minus_sign_is_ignored() {
        assert_eq!(parse_formatted_amount("-300"), dec!(300));
    }

    #[test]
    fn test_second_decimal_point_truncates() {
        assert_eq!(parse_formatted_amount("1.2.3"), dec!(1.2));
    }

    #[test]
    fn test_leading_decimal_point() {
        assert_eq!(parse_formatted_amount(".5"), dec!(0.5));
    }
}

mod input_formatting {
    use super::*;

    #[test]
    fn test_groups_thousands() {
        assert_eq!(format_amount_input("1234567"), "1,234,567");
        assert_eq!(format_amount_input("999"), "999");
    }

    #[test]
    fn test_caps_fraction_at_two_digits() {
        assert_eq!(format_amount_input("1234.5678"), "1,234.56");
        assert_eq!(format_amount_input("10.5"), "10.5");
    }

    #[test]
    fn test_drops_non_numeric_characters() {
        assert_eq!(format_amount_input("$1,2a34"), "1,234");
    }

    #[test]
    fn test_empty_stays_empty() {
        assert_eq!(format_amount_input(""), "");
        assert_eq!(format_amount_input("abc"), "");
    }

    #[test]
    fn test_reformatting_is_stable() {
        let once = format_amount_input("1234567.8");
        assert_eq!(format_amount_input(&once), once);
    }
}

mod display_formatting {
    use super::*;

    #[test]
    fn test_whole_units() {
        assert_eq!(format_amount(dec!(2450), 0), "2,450");
        assert_eq!(format_amount(dec!(1234567.4), 0), "1,234,567");
    }

    #[test]
    fn test_two_decimals() {
        assert_eq!(format_amount(dec!(2), 2), "2.00");
        assert_eq!(format_amount(dec!(1234.5), 2), "1,234.50");
    }

    #[test]
    fn test_negative_amount() {
        assert_eq!(format_amount(dec!(-1500), 0), "-1,500");
    }
}

mod labor_rate {
    use super::*;

    #[test]
    fn test_rate_is_one_hundred_per_hour() {
        assert_eq!(LABOR_RATE_PER_HOUR, dec!(100));
    }

    #[test]
    fn test_hours_from_cost() {
        assert_eq!(labor_hours_for(dec!(200)), dec!(2.00));
        assert_eq!(labor_hours_for(dec!(125)), dec!(1.25));
    }
}
