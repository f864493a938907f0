use proptest::prelude::*;
use sheetscout_parse::{Reference, ReferenceKind, TokenSubType, TokenType, Tokenizer};

fn operands(formula: &str) -> Vec<String> {
    Tokenizer::new(formula)
        .unwrap()
        .into_tokens()
        .into_iter()
        .filter(|t| t.is_reference())
        .map(|t| t.value)
        .collect()
}

#[test]
fn cross_sheet_and_external_operands_split_cleanly() {
    let refs = operands("=SUM('North Region'!B2:B9)+[Prices.xlsx]Rates!$A$1*Jan:Dec!C3");
    assert_eq!(
        refs,
        vec![
            "'North Region'!B2:B9".to_string(),
            "[Prices.xlsx]Rates!$A$1".to_string(),
            "Jan:Dec!C3".to_string(),
        ]
    );

    let parsed: Vec<Reference> = refs.iter().map(|r| Reference::parse(r)).collect();
    assert!(parsed[0].is_cross_sheet());
    assert_eq!(parsed[0].kind, ReferenceKind::Range);
    assert!(parsed[1].is_external());
    assert_eq!(parsed[1].kind, ReferenceKind::Cell);
    assert!(parsed[2].is_3d());
}

#[test]
fn nested_function_calls_are_balanced() {
    let tokenizer = Tokenizer::new("=IF(AND(A1>0,B1<5),VLOOKUP(A1,Data!A:C,3,FALSE),\"\")").unwrap();
    let opens = tokenizer
        .tokens()
        .iter()
        .filter(|t| t.token_type == TokenType::Func && t.subtype == TokenSubType::Open)
        .count();
    let closes = tokenizer
        .tokens()
        .iter()
        .filter(|t| t.token_type == TokenType::Func && t.subtype == TokenSubType::Close)
        .count();
    assert_eq!((opens, closes), (3, 3));
    let names: Vec<&str> = tokenizer
        .tokens()
        .iter()
        .filter_map(|t| t.function_name())
        .collect();
    assert_eq!(names, vec!["IF", "AND", "VLOOKUP"]);
}

#[test]
fn union_comma_outside_call_is_an_operator() {
    let tokenizer = Tokenizer::new("=(A1:A3,C1:C3)").unwrap();
    assert!(
        tokenizer
            .tokens()
            .iter()
            .any(|t| t.value == "," && t.token_type == TokenType::OpInfix)
    );
}

proptest! {
    #[test]
    fn tokens_tile_the_formula(body in "[ -~]{0,48}") {
        let formula = format!("={body}");
        if let Ok(tokenizer) = Tokenizer::new(&formula) {
            let mut at = 1;
            for token in tokenizer.tokens() {
                prop_assert_eq!(token.start, at);
                prop_assert_eq!(&formula[token.start..token.end], token.value.as_str());
                at = token.end;
            }
            prop_assert_eq!(at, formula.len());
        }
    }

    #[test]
    fn reference_parse_never_panics(operand in "[ -~]{0,32}") {
        let _ = Reference::parse(&operand);
    }
}
