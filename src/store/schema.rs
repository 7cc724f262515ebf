pub const SCHEMA: &str = r#"
-- One record per indexed image file
CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_path TEXT NOT NULL UNIQUE,
    content_hash TEXT,                         -- streamed MD5, 32 hex chars
    perceptual_hash TEXT,                      -- 64-bit DCT phash, 16 hex chars
    ocr_text TEXT NOT NULL DEFAULT '',
    external_ref TEXT NOT NULL DEFAULT '',     -- opaque caller correlation id
    updated_at TEXT NOT NULL,                  -- RFC 3339 UTC
    ocr_status TEXT NOT NULL DEFAULT 'pending',-- pending/completed/failed/skipped
    ocr_fail_count INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_images_content_hash ON images(content_hash);
CREATE INDEX IF NOT EXISTS idx_images_perceptual ON images(perceptual_hash);
CREATE INDEX IF NOT EXISTS idx_images_ocr_status ON images(ocr_status);

-- Ranked full-text index over OCR text, mirrored from the images table
CREATE VIRTUAL TABLE IF NOT EXISTS images_fts USING fts5(
    file_path, ocr_text,
    content='images', content_rowid='id'
);

-- Triggers keep the FTS index synchronized with the primary table.
-- Updates are delete-then-reinsert so the ranked index never diverges.
CREATE TRIGGER IF NOT EXISTS images_ai AFTER INSERT ON images BEGIN
  INSERT INTO images_fts(rowid, file_path, ocr_text)
  VALUES (new.id, new.file_path, new.ocr_text);
END;

CREATE TRIGGER IF NOT EXISTS images_ad AFTER DELETE ON images BEGIN
  INSERT INTO images_fts(images_fts, rowid, file_path, ocr_text)
  VALUES ('delete', old.id, old.file_path, old.ocr_text);
END;

CREATE TRIGGER IF NOT EXISTS images_au AFTER UPDATE ON images BEGIN
  INSERT INTO images_fts(images_fts, rowid, file_path, ocr_text)
  VALUES ('delete', old.id, old.file_path, old.ocr_text);
  INSERT INTO images_fts(rowid, file_path, ocr_text)
  VALUES (new.id, new.file_path, new.ocr_text);
END;
"#;

/// Best-effort schema migrations, applied individually and allowed to
/// fail when already applied.
pub const MIGRATIONS: &[&str] = &[
    "ALTER TABLE images ADD COLUMN external_ref TEXT NOT NULL DEFAULT ''",
    "ALTER TABLE images ADD COLUMN ocr_fail_count INTEGER NOT NULL DEFAULT 0",
];
