use abc_runtime::consts::CX_MIN_SIZE;
use abc_runtime::prelude::*;

use quickcheck::TestResult;
use quickcheck_macros::quickcheck;

fn cx() -> Context {
    Environment::new()
        .create_context(CX_MIN_SIZE)
        .expect("context")
}

fn match_istr(cx: &mut Context, expected: &str) {
    assert_eq!(cx.peek_istr().as_deref(), Ok(expected));
    cx.drop_top().expect("drop");
}

fn decimal_round_trip(cx: &mut Context, n: i64) {
    let repr = n.to_string();
    cx.intro_i64(n).expect("intro");
    assert_eq!(cx.peek_istr().as_deref(), Ok(repr.as_str()));
    cx.drop_top().expect("drop");

    cx.intro_istr(&repr).expect("intro istr");
    assert_eq!(cx.peek_i64(), Ok(n));
    cx.drop_top().expect("drop");
}

#[test]
fn decimal_table() {
    let mut cx = cx();
    for n in [
        0,
        1,
        -1,
        -1073741824,
        -1073741823,
        1073741823,
        1073741824,
        -2147483649,
        -2147483648,
        -2147483647,
        2147483647,
        2147483648,
        2147483649,
        999999999999999999,
        1000000000000000000,
        9223372036854775807,
        -999999999999999999,
        -1000000000000000000,
        -9223372036854775807,
        i64::MIN,
    ] {
        decimal_round_trip(&mut cx, n);
    }
}

#[test]
fn i32_round_trips() {
    let mut cx = cx();
    for n in [
        i32::MIN,
        -i32::MAX,
        0,
        i32::MAX,
        -((1 << 30) - 1),
        (1 << 30) - 1,
        1 << 30,
        -(1 << 30),
    ] {
        cx.intro_i32(n).expect("intro");
        assert_eq!(cx.peek_i32(), Ok(n));
        cx.drop_top().expect("drop");
    }
}

#[test]
fn i64_round_trips() {
    let mut cx = cx();
    for n in [
        i64::MIN,
        -i64::MAX,
        0,
        i64::MAX,
        -999999999999999999,
        999999999999999999,
        1000000000000000000,
        -1000000000000000000,
    ] {
        cx.intro_i64(n).expect("intro");
        assert_eq!(cx.peek_i64(), Ok(n));
        cx.drop_top().expect("drop");
    }
}

#[test]
fn peeks_report_out_of_range() {
    let mut cx = cx();
    cx.intro_i64(1 << 40).expect("intro");
    assert_eq!(cx.peek_i32(), Err(RtError::BuffSz));
    assert_eq!(cx.peek_i64(), Ok(1 << 40));
    cx.drop_top().expect("drop");

    cx.intro_istr("123456789012345678901234567890").expect("intro");
    assert_eq!(cx.peek_i64(), Err(RtError::BuffSz));
    assert_eq!(
        cx.peek_istr().as_deref(),
        Ok("123456789012345678901234567890")
    );
    cx.drop_top().expect("drop");
}

#[test]
fn istr_rejects_bad_literals() {
    let mut cx = cx();
    for s in ["", "-", "007", "-0", "+1", "12x", " 12", "12 "] {
        assert_eq!(cx.intro_istr(s), Err(RtError::Inval), "literal {s:?}");
    }
}

#[test]
fn arithmetic_on_non_integers_is_refused() {
    let mut cx = cx();
    cx.intro_unit().expect("unit");
    cx.intro_i32(3).expect("int");
    assert_eq!(cx.int_add(), Err(RtError::TypeError));
    assert_eq!(cx.int_mul(), Err(RtError::TypeError));
    assert_eq!(cx.int_div(), Err(RtError::TypeError));
    // operands stay put
    assert_eq!(cx.peek_i32(), Ok(3));
}

fn add_case(cx: &mut Context, a: &str, b: &str, expected: &str) {
    for (x, y) in [(a, b), (b, a)] {
        cx.intro_istr(x).expect("a");
        cx.intro_istr(y).expect("b");
        cx.int_add().expect("add");
        match_istr(cx, expected);
    }
}

fn mul_case(cx: &mut Context, a: &str, b: &str, expected: &str) {
    for (x, y) in [(a, b), (b, a)] {
        cx.intro_istr(x).expect("a");
        cx.intro_istr(y).expect("b");
        cx.int_mul().expect("mul");
        match_istr(cx, expected);
    }
}

fn neg_case(cx: &mut Context, a: &str, expected: &str) {
    for (x, y) in [(a, expected), (expected, a)] {
        cx.intro_istr(x).expect("intro");
        cx.int_neg().expect("neg");
        match_istr(cx, y);
    }
}

fn div_case(cx: &mut Context, dividend: &str, divisor: &str, quotient: &str, remainder: &str) {
    cx.intro_istr(dividend).expect("dividend");
    cx.intro_istr(divisor).expect("divisor");
    cx.int_div().expect("div");
    match_istr(cx, remainder);
    match_istr(cx, quotient);
}

#[test]
fn smallint_arithmetic() {
    let mut cx = cx();
    add_case(&mut cx, "1", "2", "3");
    add_case(&mut cx, "60", "-12", "48");
    neg_case(&mut cx, "0", "0");
    neg_case(&mut cx, "1", "-1");
    neg_case(&mut cx, "42", "-42");
    mul_case(&mut cx, "1", "1044", "1044");
    mul_case(&mut cx, "129", "0", "0");
    mul_case(&mut cx, "13", "12", "156");
    mul_case(&mut cx, "19", "-27", "-513");
    div_case(&mut cx, "11", "3", "3", "2");
    div_case(&mut cx, "-11", "3", "-4", "1");
    div_case(&mut cx, "11", "-3", "-4", "-1");
    div_case(&mut cx, "-11", "-3", "3", "-2");
}

#[test]
fn bignum_arithmetic() {
    let mut cx = cx();
    add_case(&mut cx, "10000000000", "0", "10000000000");
    add_case(&mut cx, "10000000000", "20000000000", "30000000000");
    add_case(&mut cx, "123456789", "9876543210", "9999999999");
    add_case(&mut cx, "-123456789", "9876543210", "9753086421");
    add_case(
        &mut cx,
        "999999999999999999",
        "1",
        "1000000000000000000",
    );
    add_case(
        &mut cx,
        "123456789012345678901234567890",
        "-123456789012345678901234567890",
        "0",
    );
    neg_case(
        &mut cx,
        "123456789012345678901234567890",
        "-123456789012345678901234567890",
    );
    mul_case(&mut cx, "123456789", "42", "5185185138");
    mul_case(
        &mut cx,
        "1000000000000000000",
        "1000000000000000000",
        "1000000000000000000000000000000000000",
    );
    div_case(
        &mut cx,
        "10000000000000000000",
        "3",
        "3333333333333333333",
        "1",
    );
    div_case(
        &mut cx,
        "-10000000000000000000",
        "3",
        "-3333333333333333334",
        "2",
    );
    div_case(
        &mut cx,
        "1000000000000000000000000",
        "1000000000000",
        "1000000000000",
        "0",
    );
    // results shrink back to small integers when they fit
    add_case(&mut cx, "1073741824", "-1", "1073741823");
    div_case(&mut cx, "1152921504606846976", "1073741824", "1073741824", "0");
}

#[test]
fn division_by_zero_is_a_type_error() {
    let mut cx = cx();
    cx.intro_istr("11").expect("dividend");
    cx.intro_istr("0").expect("divisor");
    assert_eq!(cx.int_div(), Err(RtError::TypeError));
    // operands are untouched
    match_istr(&mut cx, "0");
    match_istr(&mut cx, "11");
}

#[test]
fn arithmetic_leaves_no_garbage() {
    let mut cx = cx();
    let live = cx.memory_stats().live_bytes();
    cx.intro_istr("123456789123456789123456789").expect("a");
    cx.intro_istr("-987654321987654321").expect("b");
    cx.int_add().expect("add");
    cx.intro_istr("281474976710656").expect("c");
    cx.int_mul().expect("mul");
    cx.intro_istr("1000000007").expect("d");
    cx.int_div().expect("div");
    cx.drop_top().expect("drop r");
    cx.drop_top().expect("drop q");
    assert_eq!(cx.memory_stats().live_bytes(), live);
}

#[quickcheck]
fn qc_add_matches_wide_arithmetic(a: i64, b: i64) {
    let mut cx = cx();
    cx.intro_i64(a).expect("a");
    cx.intro_i64(b).expect("b");
    cx.int_add().expect("add");
    let expected = (i128::from(a) + i128::from(b)).to_string();
    assert_eq!(cx.peek_istr(), Ok(expected));
}

#[quickcheck]
fn qc_mul_matches_wide_arithmetic(a: i64, b: i64) {
    let mut cx = cx();
    cx.intro_i64(a).expect("a");
    cx.intro_i64(b).expect("b");
    cx.int_mul().expect("mul");
    let expected = (i128::from(a) * i128::from(b)).to_string();
    assert_eq!(cx.peek_istr(), Ok(expected));
}

#[quickcheck]
fn qc_add_commutes(a: i64, b: i64) {
    let mut cx = cx();
    cx.intro_i64(a).expect("a");
    cx.intro_i64(b).expect("b");
    cx.int_add().expect("add");
    let ab = cx.peek_istr().expect("peek");
    cx.drop_top().expect("drop");
    cx.intro_i64(b).expect("b");
    cx.intro_i64(a).expect("a");
    cx.int_add().expect("add");
    assert_eq!(cx.peek_istr(), Ok(ab));
}

#[quickcheck]
fn qc_neg_is_an_involution(n: i64) {
    let mut cx = cx();
    cx.intro_i64(n).expect("intro");
    cx.int_neg().expect("neg");
    cx.int_neg().expect("neg");
    assert_eq!(cx.peek_i64(), Ok(n));
}

#[quickcheck]
fn qc_floor_division_law(a: i64, b: i64) -> TestResult {
    if b == 0 {
        return TestResult::discard();
    }
    let mut cx = cx();
    cx.intro_i64(a).expect("a");
    cx.intro_i64(b).expect("b");
    cx.int_div().expect("div");
    let r: i128 = cx.peek_istr().expect("r").parse().expect("decimal");
    cx.drop_top().expect("drop");
    let q: i128 = cx.peek_istr().expect("q").parse().expect("decimal");

    // a = b·q + r, with r on the divisor's side of zero
    let (a, b) = (i128::from(a), i128::from(b));
    assert_eq!(a, b * q + r);
    if b > 0 {
        assert!((0..b).contains(&r));
    } else {
        assert!(r <= 0 && r > b);
    }
    TestResult::passed()
}

#[quickcheck]
fn qc_decimal_round_trip(n: i64) {
    let mut cx = cx();
    cx.intro_istr(&n.to_string()).expect("intro");
    assert_eq!(cx.peek_i64(), Ok(n));
}

#[quickcheck]
fn qc_copy_preserves_integers(n: i64) {
    let mut cx = cx();
    let live = cx.memory_stats().live_bytes();
    cx.intro_i64(n).expect("intro");
    cx.copy().expect("copy");
    assert_eq!(cx.peek_i64(), Ok(n));
    cx.drop_top().expect("drop");
    assert_eq!(cx.peek_i64(), Ok(n));
    cx.drop_top().expect("drop");
    assert_eq!(cx.memory_stats().live_bytes(), live);
}
