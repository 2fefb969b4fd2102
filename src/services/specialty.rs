//! Static mapping from a group's specialty code to its curriculum.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Specialty {
    /// Computer systems and networks (ПКС)
    ComputerSystems,
    /// Information systems (ИС)
    InformationSystems,
    /// Economics (ЭК)
    Economics,
    /// Management (МН)
    Management,
    General,
}

const COMPUTER_SYSTEMS: &[&str] = &[
    "Программирование на Python",
    "Базы данных",
    "Веб-разработка",
    "Алгоритмы и структуры данных",
    "Архитектура программного обеспечения",
    "Тестирование программного обеспечения",
    "Математический анализ",
    "Дискретная математика",
    "Английский язык",
    "Физическая культура",
];

const INFORMATION_SYSTEMS: &[&str] = &[
    "Информационные технологии",
    "Базы данных",
    "Сетевые технологии",
    "Системный анализ",
    "Проектирование ИС",
    "Математическая логика",
    "Теория вероятностей",
    "Английский язык",
    "Физическая культура",
    "Экономика информационных систем",
];

const ECONOMICS: &[&str] = &[
    "Микроэкономика",
    "Макроэкономика",
    "Бухгалтерский учет",
    "Финансовый менеджмент",
    "Маркетинг",
    "Статистика",
    "Эконометрика",
    "Английский язык",
    "Физическая культура",
    "Право",
    "Информационные технологии в экономике",
];

const MANAGEMENT: &[&str] = &[
    "Основы менеджмента",
    "Управление персоналом",
    "Стратегический менеджмент",
    "Маркетинг",
    "Финансовый менеджмент",
    "Проектный менеджмент",
    "Бизнес-планирование",
    "Английский язык",
    "Физическая культура",
    "Экономика",
    "Психология управления",
];

const GENERAL: &[&str] = &["Английский язык", "Физическая культура", "Философия", "История", "Экология"];

impl Specialty {
    /// Resolve a specialty code. Codes are matched by containment in this
    /// order, so `ПКС-веч` still lands in the computer systems bucket.
    pub fn from_code(code: &str) -> Specialty {
        if code.contains("ПКС") {
            Specialty::ComputerSystems
        } else if code.contains("ИС") {
            Specialty::InformationSystems
        } else if code.contains("ЭК") {
            Specialty::Economics
        } else if code.contains("МН") {
            Specialty::Management
        } else {
            Specialty::General
        }
    }

    pub fn course_names(self) -> &'static [&'static str] {
        match self {
            Specialty::ComputerSystems => COMPUTER_SYSTEMS,
            Specialty::InformationSystems => INFORMATION_SYSTEMS,
            Specialty::Economics => ECONOMICS,
            Specialty::Management => MANAGEMENT,
            Specialty::General => GENERAL,
        }
    }

    pub fn includes(self, course_name: &str) -> bool {
        self.course_names().contains(&course_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_resolve_to_buckets() {
        assert_eq!(Specialty::from_code("ПКС"), Specialty::ComputerSystems);
        assert_eq!(Specialty::from_code("ИС"), Specialty::InformationSystems);
        assert_eq!(Specialty::from_code("ЭК"), Specialty::Economics);
        assert_eq!(Specialty::from_code("МН"), Specialty::Management);
        assert_eq!(Specialty::from_code("ФИЗ"), Specialty::General);
        assert_eq!(Specialty::from_code(""), Specialty::General);
    }

    #[test]
    fn containment_match_is_ordered() {
        assert_eq!(Specialty::from_code("ПКС-веч"), Specialty::ComputerSystems);
        assert_eq!(Specialty::from_code("заочн-ИС"), Specialty::InformationSystems);
    }

    #[test]
    fn every_bucket_carries_common_courses() {
        for s in [
            Specialty::ComputerSystems,
            Specialty::InformationSystems,
            Specialty::Economics,
            Specialty::Management,
            Specialty::General,
        ] {
            assert!(s.includes("Английский язык"));
            assert!(s.includes("Физическая культура"));
        }
        assert!(!Specialty::General.includes("Базы данных"));
    }
}
