//! Prompt construction and answer post-processing.

/// Reply used when retrieval finds nothing above the similarity threshold.
pub const NO_CONTEXT_ANSWER: &str = "ไม่พบข้อมูลในฐานข้อมูลที่ตรงกับคำถามครับ";

/// Reasoning delimiters some models emit around their chain of thought.
const REASONING_TAGS: [&str; 2] = ["<think>", "</think>"];

/// Markers that introduce the final answer in a generated reply.
const ANSWER_MARKERS: [&str; 3] = ["คำตอบสรุป:", "Answer:", "สรุป:"];

/// Build the grounded-answer prompt for `question` over `context`.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "### คำสั่ง: คุณคือผู้เชี่ยวชาญด้านกฎหมายภาษี\n\
         ตอบคำถามโดยใช้ข้อมูลจาก 'ข้อมูลอ้างอิง' เท่านั้น ห้ามใช้ความรู้ภายนอก\n\
         หากไม่พบคำตอบในข้อมูลอ้างอิง ให้แจ้งว่า 'ไม่พบข้อมูลที่เกี่ยวข้อง'\n\
         ต้องระบุเลขที่หนังสืออ้างอิงในรูปแบบ 'เลขที่หนังสือ: [กคxxxx/xxxx]' เสมอ\n\n\
         ### ข้อมูลอ้างอิง:\n\
         {}\n\n\
         ### คำถาม:\n\
         {}\n\n\
         ### คำตอบ (สั้นและได้ใจความ):",
        context, question
    )
}

/// Strip reasoning tags, then keep only the text after the last answer
/// marker, if any.
pub fn clean_answer(raw: &str) -> String {
    let mut text = raw.to_string();
    for tag in REASONING_TAGS {
        text = text.replace(tag, "");
    }

    let cut = ANSWER_MARKERS
        .iter()
        .filter_map(|m| text.rfind(m).map(|pos| pos + m.len()))
        .max();

    match cut {
        Some(end) => text[end..].trim().to_string(),
        None => text.trim().to_string(),
    }
}
