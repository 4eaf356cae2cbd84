use abc_runtime::consts::CX_MIN_SIZE;
use abc_runtime::prelude::*;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn cx() -> Context {
    Environment::new()
        .create_context(CX_MIN_SIZE)
        .expect("context")
}

#[test]
fn token_validation() {
    for ok in [
        "foo",
        "hello world",
        "<>",
        ".:,;|",
        "\"",
        "@",
        "'",
        "x→y→z.κλμνξοπρς",
        // 63 bytes either way
        "123456789012345678901234567890123456789012345678901234567890123",
        "←↑→↓←↑→↓←↑→↓←↑→↓←↑→↓←",
    ] {
        assert!(valid_token(ok), "expected valid: {ok}");
    }
    for bad in [
        "{foo}",
        "foo\nbar",
        "",
        "1234567890123456789012345678901234567890123456789012345678901234",
        "←↑→↓←↑→↓←↑→↓←↑→↓←↑→↓←z",
        "nul\u{0}byte",
        "replacement\u{fffd}",
    ] {
        assert!(!valid_token(bad), "expected invalid: {bad:?}");
    }
}

fn elim_list_i32(cx: &mut Context, expected: i32) {
    assert_eq!(cx.unwrap_sum(), Ok(SumTag::InL));
    cx.assocr().expect("assocr");
    assert_eq!(cx.peek_i32(), Ok(expected));
    cx.drop_top().expect("drop");
}

fn elim_list_end(cx: &mut Context) {
    assert_eq!(cx.unwrap_sum(), Ok(SumTag::InR));
    cx.elim_unit().expect("elim");
}

#[test]
fn text_introduction() {
    let mut cx = cx();

    cx.intro_text("hello".as_bytes()).expect("ascii");
    for c in [104, 101, 108, 108, 111] {
        elim_list_i32(&mut cx, c);
    }
    elim_list_end(&mut cx);

    cx.intro_text("←↑→↓".as_bytes()).expect("utf8");
    for c in [0x2190, 0x2191, 0x2192, 0x2193] {
        elim_list_i32(&mut cx, c);
    }
    elim_list_end(&mut cx);

    // a size-limited view of a larger buffer
    cx.intro_text(&"ab↑cd".as_bytes()[..5]).expect("limited");
    for c in [97, 98, 0x2191] {
        elim_list_i32(&mut cx, c);
    }
    elim_list_end(&mut cx);

    // line feeds are the one permitted control character
    cx.intro_text("a\nb".as_bytes()).expect("lf");
    for c in [97, 10, 98] {
        elim_list_i32(&mut cx, c);
    }
    elim_list_end(&mut cx);
}

#[test]
fn text_introduction_rejects_bad_input() {
    let mut cx = cx();
    let live = cx.memory_stats().live_bytes();

    // a truncated code point
    assert_eq!(cx.intro_text(&"→".as_bytes()[..1]), Err(RtError::Inval));
    assert_eq!(cx.intro_text(&"→".as_bytes()[..2]), Err(RtError::Inval));
    // control characters other than LF
    assert_eq!(cx.intro_text(b"\x07"), Err(RtError::Inval));
    assert_eq!(cx.intro_text(b"\r"), Err(RtError::Inval));
    assert_eq!(cx.intro_text(b"\t"), Err(RtError::Inval));
    // rejection allocates nothing
    assert_eq!(cx.memory_stats().live_bytes(), live);
}

#[test]
fn empty_texts() {
    let mut cx = cx();
    cx.intro_text(&"Hello, World!".as_bytes()[..0]).expect("cut");
    cx.intro_text(b"").expect("empty");
    elim_list_end(&mut cx);
    elim_list_end(&mut cx);
}

fn fill(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen()).collect()
}

#[test]
fn binary_introduction() {
    let mut cx = cx();
    for i in 0..6 {
        let data = fill(500 * i, i as u64);
        cx.intro_binary(&data).expect("intro");
        for &b in &data {
            elim_list_i32(&mut cx, i32::from(b));
        }
        elim_list_end(&mut cx);
    }
}

fn read_binary_in_chunks(cx: &mut Context, expected: &[u8], chunk: usize) {
    let mut buf = vec![0u8; chunk];
    let mut at = 0;
    loop {
        let n = cx.read_binary(&mut buf).expect("read");
        if n == 0 {
            break;
        }
        assert_eq!(&buf[..n], &expected[at..at + n]);
        at += n;
    }
    assert_eq!(at, expected.len());
    elim_list_end(cx);
}

#[test]
fn binary_chunked_reads() {
    let mut cx = cx();
    let data = fill(12345, 7);
    cx.intro_binary(&data).expect("intro");
    for _ in 0..6 {
        cx.copy().expect("copy");
    }
    for chunk in [
        data.len(),
        data.len() - 1,
        data.len() + 1,
        data.len() / 3,
        data.len() / 3 + 1,
        data.len() / 3 - 1,
        data.len() / 2,
    ] {
        read_binary_in_chunks(&mut cx, &data, chunk);
    }
}

fn read_text_in_chunks(cx: &mut Context, expected: &str, chunk_bytes: usize, chunk_chars: usize) {
    let mut buf = vec![0u8; chunk_bytes];
    let mut bytes_at = 0;
    let mut chars_at = 0;
    loop {
        let (bytes, chars) = cx.read_text(&mut buf, chunk_chars).expect("read");
        if bytes == 0 {
            assert_eq!(chars, 0);
            break;
        }
        assert_eq!(&buf[..bytes], &expected.as_bytes()[bytes_at..bytes_at + bytes]);
        bytes_at += bytes;
        chars_at += chars;
    }
    assert_eq!(bytes_at, expected.len());
    assert_eq!(chars_at, expected.chars().count());
    elim_list_end(cx);
}

#[test]
fn text_chunked_reads() {
    let mut cx = cx();
    for s in [
        "Hello, world! This is a test string.",
        "←↖↑↗→↘↓↙←↖↑↗→↘↓↙←↖↑↗→↘↓↙←↖↑↗→↘↓↙←↖↑↗→",
        "★★★☆☆",
        "μL.((α*L)+β)",
    ] {
        cx.intro_text(s.as_bytes()).expect("intro");
        for _ in 0..3 {
            cx.copy().expect("copy");
        }
        read_text_in_chunks(&mut cx, s, s.len(), usize::MAX);
        read_text_in_chunks(&mut cx, s, s.len() + 1, usize::MAX);
        read_text_in_chunks(&mut cx, s, 4, usize::MAX);
        read_text_in_chunks(&mut cx, s, 4, 1);
    }
    // the empty text reads as an immediate terminator
    cx.intro_text(b"").expect("intro");
    read_text_in_chunks(&mut cx, "", 8, usize::MAX);
}

#[test]
fn reads_leave_no_garbage() {
    let mut cx = cx();
    let live = cx.memory_stats().live_bytes();
    let data = fill(4096, 3);
    cx.intro_binary(&data).expect("intro");
    let mut buf = [0u8; 1000];
    while cx.read_binary(&mut buf).expect("read") > 0 {}
    elim_list_end(&mut cx);
    assert_eq!(cx.memory_stats().live_bytes(), live);
}

#[test]
fn read_binary_requires_byte_elements() {
    let mut cx = cx();
    cx.intro_unit().expect("unit");
    cx.wrap_sum(SumTag::InR).expect("nil");
    cx.intro_i32(1000).expect("intro");
    cx.assocl().expect("cons shape");
    cx.wrap_sum(SumTag::InL).expect("cons");
    // a list whose element is out of byte range
    let mut buf = [0u8; 4];
    assert_eq!(cx.read_binary(&mut buf), Err(RtError::TypeError));
}
