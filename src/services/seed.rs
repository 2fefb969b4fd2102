//! Replaces the catalog, groups and rooms with the demo data set and
//! generates a fresh timetable over it.

use crate::db::models::{NewCourse, NewGroup, NewRoom, TeacherCourse};
use crate::error::SchoolError;
use crate::models::school::{RoomType, validate_course_fields, validate_group_fields, validate_room_fields};
use crate::schema;
use crate::services::placement::{self, GenerationReport};
use diesel::PgConnection;
use diesel::prelude::*;
use log::info;
use rand::Rng;

const COURSES: [(&str, &str); 36] = [
    ("Программирование на Python", "Основы программирования на Python"),
    ("Базы данных", "Проектирование и управление базами данных"),
    ("Веб-разработка", "Создание веб-приложений"),
    ("Алгоритмы и структуры данных", "Изучение алгоритмов и структур данных"),
    ("Архитектура программного обеспечения", "Проектирование архитектуры ПО"),
    ("Тестирование программного обеспечения", "Методы тестирования ПО"),
    ("Математический анализ", "Основы математического анализа"),
    ("Дискретная математика", "Дискретная математика для программистов"),
    ("Информационные технологии", "Основы информационных технологий"),
    ("Сетевые технологии", "Компьютерные сети и протоколы"),
    ("Системный анализ", "Анализ и проектирование систем"),
    ("Проектирование ИС", "Проектирование информационных систем"),
    ("Математическая логика", "Основы математической логики"),
    ("Теория вероятностей", "Теория вероятностей и статистика"),
    ("Экономика информационных систем", "Экономические аспекты ИС"),
    ("Микроэкономика", "Основы микроэкономики"),
    ("Макроэкономика", "Основы макроэкономики"),
    ("Бухгалтерский учет", "Основы бухгалтерского учета"),
    ("Финансовый менеджмент", "Управление финансами"),
    ("Маркетинг", "Основы маркетинга"),
    ("Статистика", "Статистические методы в экономике"),
    ("Эконометрика", "Эконометрические модели"),
    ("Право", "Основы права"),
    ("Информационные технологии в экономике", "ИТ для экономистов"),
    ("Основы менеджмента", "Основы управления"),
    ("Управление персоналом", "HR-менеджмент"),
    ("Стратегический менеджмент", "Стратегическое планирование"),
    ("Проектный менеджмент", "Управление проектами"),
    ("Бизнес-планирование", "Создание бизнес-планов"),
    ("Экономика", "Основы экономики"),
    ("Психология управления", "Психологические аспекты управления"),
    ("Английский язык", "Иностранный язык"),
    ("Физическая культура", "Физическое воспитание"),
    ("Философия", "Основы философии"),
    ("История", "История России"),
    ("Экология", "Основы экологии"),
];

// (name, specialty, course_year, group_number)
const GROUPS: [(&str, &str, i32, i32); 10] = [
    ("ПКС-21", "ПКС", 2, 1),
    ("ПКС-22", "ПКС", 2, 2),
    ("ПКС-31", "ПКС", 3, 1),
    ("ИС-21", "ИС", 2, 1),
    ("ИС-22", "ИС", 2, 2),
    ("ИС-31", "ИС", 3, 1),
    ("ЭК-21", "ЭК", 2, 1),
    ("ЭК-31", "ЭК", 3, 1),
    ("МН-21", "МН", 2, 1),
    ("МН-31", "МН", 3, 1),
];

const MAIN_BUILDING: &str = "Главный корпус";
const IT_BUILDING: &str = "Корпус информатики";
const ECONOMICS_BUILDING: &str = "Корпус экономики";

const ROOMS: [(&str, i32, &str, RoomType); 15] = [
    ("101", 30, MAIN_BUILDING, RoomType::Lecture),
    ("102", 30, MAIN_BUILDING, RoomType::Lecture),
    ("103", 25, MAIN_BUILDING, RoomType::Lab),
    ("201", 30, MAIN_BUILDING, RoomType::Lecture),
    ("202", 25, MAIN_BUILDING, RoomType::Computer),
    ("203", 25, MAIN_BUILDING, RoomType::Lab),
    ("И-101", 30, IT_BUILDING, RoomType::Lecture),
    ("И-102", 25, IT_BUILDING, RoomType::Computer),
    ("И-103", 25, IT_BUILDING, RoomType::Computer),
    ("И-201", 30, IT_BUILDING, RoomType::Lecture),
    ("И-202", 25, IT_BUILDING, RoomType::Lab),
    ("Э-101", 30, ECONOMICS_BUILDING, RoomType::Lecture),
    ("Э-102", 25, ECONOMICS_BUILDING, RoomType::Lecture),
    ("Э-201", 30, ECONOMICS_BUILDING, RoomType::Lecture),
    ("Э-202", 25, ECONOMICS_BUILDING, RoomType::Lab),
];

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub courses: usize,
    pub groups: usize,
    pub rooms: usize,
    /// Teaching assignments carried over to the new catalog by course name
    pub relinked_assignments: usize,
    pub generation: GenerationReport,
}

fn demo_courses() -> Result<Vec<NewCourse>, SchoolError> {
    COURSES
        .iter()
        .map(|(name, description)| {
            validate_course_fields(name, Some(description))?;
            Ok(NewCourse {
                name: name.to_string(),
                description: Some(description.to_string()),
            })
        })
        .collect()
}

fn demo_groups(max_students: i32) -> Result<Vec<NewGroup>, SchoolError> {
    GROUPS
        .iter()
        .map(|(name, specialty, course_year, group_number)| {
            validate_group_fields(name, specialty, *course_year, *group_number, max_students)?;
            Ok(NewGroup {
                name: name.to_string(),
                specialty: specialty.to_string(),
                course_year: *course_year,
                group_number: *group_number,
                max_students,
            })
        })
        .collect()
}

fn demo_rooms() -> Result<Vec<NewRoom>, SchoolError> {
    ROOMS
        .iter()
        .map(|(number, capacity, building, room_type)| {
            validate_room_fields(number, *capacity, building)?;
            Ok(NewRoom {
                number: number.to_string(),
                capacity: *capacity,
                building: building.to_string(),
                room_type: room_type.as_str().to_string(),
                is_active: true,
            })
        })
        .collect()
}

/// Delete the timetable, groups, catalog and rooms, then insert the demo data.
/// Teaching assignments whose course name survives are re-attached.
fn replace_data(conn: &mut PgConnection, max_students: i32) -> Result<SeedReport, SchoolError> {
    use schema::course::dsl as C;
    use schema::group::dsl as G;
    use schema::room::dsl as RM;
    use schema::schedule::dsl as S;
    use schema::student_group_association::dsl as SG;
    use schema::teacher_course_association::dsl as TC;
    use schema::teacher_substitution::dsl as TS;

    let courses = demo_courses()?;
    let groups = demo_groups(max_students)?;
    let rooms = demo_rooms()?;

    let assignments: Vec<(i64, String)> = TC::teacher_course_association
        .inner_join(C::course)
        .select((TC::teacher_id, C::name))
        .load(conn)?;

    let subs = diesel::delete(TS::teacher_substitution).execute(conn)?;
    let rows = diesel::delete(S::schedule).execute(conn)?;
    diesel::delete(SG::student_group_association).execute(conn)?;
    diesel::delete(G::group).execute(conn)?;
    diesel::delete(C::course).execute(conn)?;
    diesel::delete(RM::room).execute(conn)?;
    info!(
        "Seed: cleared existing data (schedule rows={}, substitutions={})",
        rows, subs
    );

    let course_ids: Vec<(i64, String)> = diesel::insert_into(C::course)
        .values(&courses)
        .returning((C::id, C::name))
        .get_results(conn)?;
    diesel::insert_into(G::group).values(&groups).execute(conn)?;
    diesel::insert_into(RM::room).values(&rooms).execute(conn)?;

    let relink: Vec<TeacherCourse> = assignments
        .iter()
        .filter_map(|(teacher_id, name)| {
            course_ids
                .iter()
                .find(|(_, course_name)| course_name == name)
                .map(|(course_id, _)| TeacherCourse {
                    teacher_id: *teacher_id,
                    course_id: *course_id,
                })
        })
        .collect();
    let relinked = if relink.is_empty() {
        0
    } else {
        diesel::insert_into(TC::teacher_course_association)
            .values(&relink)
            .on_conflict_do_nothing()
            .execute(conn)?
    };

    info!(
        "Seed: inserted {} course(s), {} group(s), {} room(s); re-linked {} of {} teaching assignment(s)",
        course_ids.len(),
        groups.len(),
        rooms.len(),
        relinked,
        assignments.len()
    );
    Ok(SeedReport {
        courses: course_ids.len(),
        groups: groups.len(),
        rooms: rooms.len(),
        relinked_assignments: relinked,
        generation: GenerationReport::default(),
    })
}

pub fn run<R: Rng + ?Sized>(conn: &mut PgConnection, max_students: i32, rng: &mut R) -> Result<SeedReport, SchoolError> {
    let mut report = conn.transaction::<_, SchoolError, _>(|conn| replace_data(conn, max_students))?;
    report.generation = placement::run(conn, rng)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::NewUser;
    use crate::models::school::{DEFAULT_MAX_STUDENTS, Role};
    use crate::services::specialty::Specialty;
    use crate::test_support::test_connection;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn demo_data_is_valid() {
        assert_eq!(demo_courses().unwrap().len(), 36);
        assert_eq!(demo_groups(DEFAULT_MAX_STUDENTS).unwrap().len(), 10);
        assert_eq!(demo_rooms().unwrap().len(), 15);
    }

    #[test]
    fn every_demo_group_has_catalog_courses() {
        for (_, specialty, _, _) in GROUPS {
            let bucket = Specialty::from_code(specialty);
            assert_ne!(bucket, Specialty::General);
            assert!(
                bucket
                    .course_names()
                    .iter()
                    .all(|name| COURSES.iter().any(|(course, _)| course == name))
            );
        }
    }

    #[test]
    fn seed_relinks_teachers_and_schedules_groups() {
        use schema::course::dsl as C;
        use schema::teacher_course_association::dsl as TC;
        use schema::user::dsl as U;

        let Some(mut conn) = test_connection() else { return };
        let teacher_id: i64 = diesel::insert_into(U::user)
            .values(&NewUser {
                username: "t_seed".into(),
                email: "t_seed@example.org".into(),
                full_name: None,
                role: Role::Teacher.as_str().into(),
            })
            .returning(U::id)
            .get_result(&mut conn)
            .unwrap();
        let course_id: i64 = diesel::insert_into(C::course)
            .values(&NewCourse {
                name: "Базы данных".into(),
                description: None,
            })
            .on_conflict(C::name)
            .do_update()
            .set(C::description.eq(None::<String>))
            .returning(C::id)
            .get_result(&mut conn)
            .unwrap();
        diesel::insert_into(TC::teacher_course_association)
            .values(&TeacherCourse { teacher_id, course_id })
            .on_conflict_do_nothing()
            .execute(&mut conn)
            .unwrap();

        let mut rng = SmallRng::seed_from_u64(7);
        let report = run(&mut conn, DEFAULT_MAX_STUDENTS, &mut rng).unwrap();
        assert_eq!(report.courses, 36);
        assert!(report.relinked_assignments >= 1);
        assert_eq!(report.generation.groups_skipped, 0);
        assert!(report.generation.rows_created > 0);
    }
}
