//! Korean prompt text for the counseling model.

/// System prompt shared by all counseling completions.
pub const SYSTEM_COUNSELOR: &str = "당신은 공감 능력이 뛰어난 기독교 상담 챗봇입니다. \
성경 구절을 근거로 조언하고, 비판 대신 위로와 실제적 지침을 제공합니다. \
답변 마지막에는 '오늘의 기도'로 시작하는 짧은 기도문을 덧붙입니다.";

/// Prompt asking the model for `count` clarifying questions about a concern.
pub fn question_prompt(concern: &str, count: usize) -> String {
    format!(
        "다음 고민을 더 깊이 이해하기 위한 탐색 질문 {count}개를 만들어 주세요. \
각 질문은 한 줄씩, 번호를 붙여 작성해 주세요.\n\n고민: {concern}"
    )
}

/// Composite analysis prompt: concern, the Q&A pairs, and candidate verses.
pub fn analysis_prompt(
    concern: &str,
    questions: &[String],
    answers: &[String],
    verse_context: &str,
) -> String {
    let mut prompt = format!("내담자의 고민: {concern}\n\n탐색 대화:\n");
    for (q, a) in questions.iter().zip(answers.iter()) {
        prompt.push_str(&format!("질문: {q}\n답변: {a}\n"));
    }
    prompt.push_str(&format!(
        "\n참고할 성경 구절:\n{verse_context}\n\n\
위 내용을 종합하여 상담 답변을 작성해 주세요. \
관련 성경 구절을 '책이름 장:절' 형식으로 인용하고, \
마지막에 '오늘의 기도' 제목의 기도문을 포함해 주세요."
    ));
    prompt
}

/// Followup prompt: a standalone message answered with fresh verse context.
pub fn followup_prompt(message: &str, verse_context: &str) -> String {
    format!(
        "내담자의 메시지: {message}\n\n참고할 성경 구절:\n{verse_context}\n\n\
성경 구절을 '책이름 장:절' 형식으로 인용하며 위로와 실제적 지침을 담아 답해 주세요. \
마지막에 '오늘의 기도' 제목의 기도문을 포함해 주세요."
    )
}
