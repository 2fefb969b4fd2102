//! Greedy timetable generator.
//!
//! Every group gets 3 or 4 sessions per weekday. Each session takes the first
//! free teacher (preferring one who teaches the course) and the first free
//! room for its (day, slot) cell. Bookings are tracked in an [`Occupancy`]
//! value that is threaded through the planner; nothing is ever released or
//! retried, so a cell without a free teacher or room is simply dropped.

use crate::db::models::{Course, Group, NewSchedule, Room};
use crate::error::SchoolError;
use crate::models::school::{LAST_TEACHING_DAY, MIN_DAY, Role, WeekType};
use crate::schema;
use crate::services::specialty::Specialty;
use diesel::PgConnection;
use diesel::prelude::*;
use log::{info, warn};
use rand::Rng;
use rand::seq::IndexedRandom;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::{self, Display, Formatter};

const MIN_SESSIONS_PER_DAY: usize = 3;
const MAX_SESSIONS_PER_DAY: usize = 4;

/// A teacher together with the courses they are assigned to teach.
#[derive(Debug, Clone)]
pub struct TeacherLoad {
    pub id: i64,
    pub teaching: BTreeSet<i64>,
}

/// Teachers and rooms already committed to a (day, slot) cell.
#[derive(Debug, Clone, Default)]
pub struct Occupancy {
    teachers: HashSet<(i64, i32, i32)>,
    rooms: HashSet<(i64, i32, i32)>,
}

impl Occupancy {
    pub fn teacher_busy(&self, teacher_id: i64, day: i32, slot: i32) -> bool {
        self.teachers.contains(&(teacher_id, day, slot))
    }

    pub fn room_busy(&self, room_id: i64, day: i32, slot: i32) -> bool {
        self.rooms.contains(&(room_id, day, slot))
    }

    pub fn book(&mut self, teacher_id: i64, room_id: i64, day: i32, slot: i32) {
        self.teachers.insert((teacher_id, day, slot));
        self.rooms.insert((room_id, day, slot));
    }

    pub fn booked_cells(&self) -> usize {
        self.teachers.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementWarning {
    NoCourses { group: String },
    NoFreeTeacher { group: String, day: i32, slot: i32 },
    NoFreeRoom { group: String, day: i32, slot: i32 },
}

impl Display for PlacementWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PlacementWarning::NoCourses { group } => write!(f, "no courses found for group {}", group),
            PlacementWarning::NoFreeTeacher { group, day, slot } => {
                write!(f, "group {}: no free teacher for {}:{}", group, day, slot)
            }
            PlacementWarning::NoFreeRoom { group, day, slot } => {
                write!(f, "group {}: no free room for {}:{}", group, day, slot)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct GroupPlan {
    pub group_id: i64,
    pub rows: Vec<NewSchedule>,
    pub warnings: Vec<PlacementWarning>,
    /// True when the group had no courses at all and was left untouched.
    pub skipped: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    pub groups_scheduled: usize,
    pub groups_skipped: usize,
    pub rows_created: usize,
    pub cells_dropped: usize,
}

/// Courses from the catalog that belong to the group's specialty curriculum.
pub fn group_courses<'a>(group: &Group, catalog: &'a [Course]) -> Vec<&'a Course> {
    let specialty = Specialty::from_code(&group.specialty);
    catalog.iter().filter(|c| specialty.includes(&c.name)).collect()
}

fn sample_day<'a, R: Rng + ?Sized>(courses: &[&'a Course], rng: &mut R) -> Vec<&'a Course> {
    let sessions = rng.random_range(MIN_SESSIONS_PER_DAY..=MAX_SESSIONS_PER_DAY);
    if courses.len() >= sessions {
        courses.choose_multiple(rng, sessions).copied().collect()
    } else {
        (0..sessions).filter_map(|_| courses.choose(rng).copied()).collect()
    }
}

fn pick_teacher(teachers: &[TeacherLoad], course_id: i64, day: i32, slot: i32, occupancy: &Occupancy) -> Option<i64> {
    teachers
        .iter()
        .find(|t| t.teaching.contains(&course_id) && !occupancy.teacher_busy(t.id, day, slot))
        .or_else(|| teachers.iter().find(|t| !occupancy.teacher_busy(t.id, day, slot)))
        .map(|t| t.id)
}

fn pick_room(rooms: &[Room], day: i32, slot: i32, occupancy: &Occupancy) -> Option<i64> {
    rooms
        .iter()
        .find(|r| r.is_active && !occupancy.room_busy(r.id, day, slot))
        .map(|r| r.id)
}

/// Plan one group's week. The occupancy is consumed and handed back with the
/// new bookings added, so callers can chain groups without shared state.
pub fn plan_group<R: Rng + ?Sized>(
    group: &Group,
    catalog: &[Course],
    teachers: &[TeacherLoad],
    rooms: &[Room],
    mut occupancy: Occupancy,
    rng: &mut R,
) -> (GroupPlan, Occupancy) {
    let mut plan = GroupPlan {
        group_id: group.id,
        rows: Vec::new(),
        warnings: Vec::new(),
        skipped: false,
    };

    let courses = group_courses(group, catalog);
    if courses.is_empty() {
        plan.warnings.push(PlacementWarning::NoCourses {
            group: group.name.clone(),
        });
        plan.skipped = true;
        return (plan, occupancy);
    }

    for day in MIN_DAY..=LAST_TEACHING_DAY {
        let day_courses = sample_day(&courses, rng);

        for (index, course) in day_courses.iter().enumerate() {
            let slot = index as i32 + 1;

            let Some(teacher_id) = pick_teacher(teachers, course.id, day, slot, &occupancy) else {
                plan.warnings.push(PlacementWarning::NoFreeTeacher {
                    group: group.name.clone(),
                    day,
                    slot,
                });
                continue;
            };

            let Some(room_id) = pick_room(rooms, day, slot, &occupancy) else {
                plan.warnings.push(PlacementWarning::NoFreeRoom {
                    group: group.name.clone(),
                    day,
                    slot,
                });
                continue;
            };

            occupancy.book(teacher_id, room_id, day, slot);
            plan.rows.push(NewSchedule {
                group_id: group.id,
                course_id: course.id,
                teacher_id,
                room_id,
                day_of_week: day,
                slot_number: slot,
                week_type: WeekType::All.as_str().to_string(),
            });
        }
    }

    (plan, occupancy)
}

/// Teachers that hold at least one teaching assignment, with their courses.
pub fn load_teachers(conn: &mut PgConnection) -> Result<Vec<TeacherLoad>, SchoolError> {
    use schema::teacher_course_association::dsl as TC;
    use schema::user::dsl as U;

    let pairs: Vec<(i64, i64)> = TC::teacher_course_association
        .inner_join(U::user)
        .filter(U::role.eq(Role::Teacher.as_str()))
        .select((TC::teacher_id, TC::course_id))
        .order((TC::teacher_id.asc(), TC::course_id.asc()))
        .load(conn)?;

    let mut by_teacher: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
    for (teacher_id, course_id) in pairs {
        by_teacher.entry(teacher_id).or_default().insert(course_id);
    }
    Ok(by_teacher
        .into_iter()
        .map(|(id, teaching)| TeacherLoad { id, teaching })
        .collect())
}

/// Generate and persist a timetable for every group.
///
/// Rows are committed once per group. A failed insert aborts the run; groups
/// committed before it stay in place.
pub fn run<R: Rng + ?Sized>(conn: &mut PgConnection, rng: &mut R) -> Result<GenerationReport, SchoolError> {
    use schema::course::dsl as C;
    use schema::group::dsl as G;
    use schema::room::dsl as RM;
    use schema::schedule::dsl as S;

    let groups: Vec<Group> = G::group.order(G::id.asc()).select(Group::as_select()).load(conn)?;
    let catalog: Vec<Course> = C::course.order(C::id.asc()).select(Course::as_select()).load(conn)?;
    let rooms: Vec<Room> = RM::room
        .filter(RM::is_active.eq(true))
        .order(RM::id.asc())
        .select(Room::as_select())
        .load(conn)?;
    let teachers = load_teachers(conn)?;

    let mut report = GenerationReport::default();
    if teachers.is_empty() {
        warn!("Generator: no teachers with teaching assignments; nothing to schedule");
        return Ok(report);
    }

    info!(
        "Generator: planning {} group(s) (courses={}, teachers={}, rooms={})",
        groups.len(),
        catalog.len(),
        teachers.len(),
        rooms.len()
    );

    let mut occupancy = Occupancy::default();
    for group in &groups {
        let (plan, next) = plan_group(group, &catalog, &teachers, &rooms, occupancy, rng);
        occupancy = next;

        for warning in &plan.warnings {
            warn!("Generator: {}", warning);
        }
        if plan.skipped {
            report.groups_skipped += 1;
            continue;
        }
        report.cells_dropped += plan.warnings.len();
        if plan.rows.is_empty() {
            continue;
        }

        let inserted = conn
            .transaction::<_, diesel::result::Error, _>(|conn| {
                diesel::insert_into(S::schedule).values(&plan.rows).execute(conn)
            })
            .map_err(|e| SchoolError::Internal(format!("insert schedule for group {} failed: {}", group.name, e)))?;

        report.groups_scheduled += 1;
        report.rows_created += inserted;
        info!("Generator: group {} scheduled ({} session(s))", group.name, inserted);
    }

    info!(
        "Generator: complete (groups={}, skipped={}, rows={}, dropped_cells={}, booked_cells={})",
        report.groups_scheduled,
        report.groups_skipped,
        report.rows_created,
        report.cells_dropped,
        occupancy.booked_cells()
    );
    Ok(report)
}
