//! A tiny string-art bitmap font, just enough glyphs for the on-screen
//! placeholder messages.

use crate::raster::Raster;

const GLYPH_H: usize = 7;

fn glyph(c: char) -> &'static str {
    match c {
        'n' => "\n....\n.  .\n.  .\n.  .\n.  .\n.  .\n.  .",
        'o' => "\n....\n.  .\n.  .\n.  .\n.  .\n.  .\n....",
        'f' => "\n....\n.\n.\n...\n.\n.\n.",
        'r' => "\n...\n.  .\n.  .\n...\n.  .\n.  .\n.  .",
        'a' => "\n....\n.  .\n.  .\n....\n.  .\n.  .\n.  .",
        'm' => "\n.   .\n.. ..\n. . .\n.   .\n.   .\n.   .\n.   .",
        'e' => "\n....\n.\n.\n...\n.\n.\n....",
        ':' => "\n\n\n.\n\n.\n\n",
        '(' => "\n  .\n .\n.\n.\n.\n .\n  .",
        _ => "",
    }
}

/// Stamp `text` onto `out` with its top-left corner at `(x, y)`, each
/// font dot drawn as a `scale` x `scale` block.
pub fn draw_text(out: &mut Raster, text: &str, x: usize, y: usize, scale: usize, rgba: [u8; 4]) {
    let mut pen_x = x;
    for c in text.chars() {
        let art = glyph(c);
        if c == ' ' {
            pen_x += 3 * scale;
            continue;
        }
        let mut width = 3;
        for (row, line) in art.lines().skip(1).enumerate() {
            for (col, ch) in line.chars().enumerate() {
                width = width.max(col + 2);
                if ch != '.' {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let px = pen_x + col * scale + dx;
                        let py = y + row * scale + dy;
                        if px < out.width() && py < out.height() {
                            out.put_pixel(px, py, rgba);
                        }
                    }
                }
            }
        }
        pen_x += width * scale;
    }
}

/// Pixel width of `text` at the given scale, for centering.
pub fn text_width(text: &str, scale: usize) -> usize {
    let mut w = 0;
    for c in text.chars() {
        if c == ' ' {
            w += 3 * scale;
            continue;
        }
        let max_col = glyph(c).lines().skip(1).map(|l| l.chars().count()).max().unwrap_or(1);
        w += (max_col + 1).max(3) * scale;
    }
    w
}

pub fn text_height(scale: usize) -> usize {
    GLYPH_H * scale
}
